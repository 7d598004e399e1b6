// Minimal daemon entry point: parse a handful of flags, bootstrap a
// node, connect to the cluster, pump the event loop. Anything fancier
// (real config file, signal handling, multiple appliers) belongs to
// whatever embeds this crate — see the module doc on `wsrep::Node` for
// why this stays small.

use wsrep::{Apply, Config, Node, NodeConfig, Role, WriteSet};
use wsrep_base::Seqno;

struct LoggingApplier;

impl Apply for LoggingApplier {
    fn apply(&self, seqno: Seqno, ws: &WriteSet) {
        tracing::info!(?seqno, keys = ws.keys.len(), "applied write-set");
    }
}

fn usage() -> ! {
    eprintln!("usage: wsrep --bind <addr> --cluster <name> --node <name> [--seed <addr>]...");
    std::process::exit(2);
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut bind_addr = None;
    let mut cluster_name = None;
    let mut node_name = None;
    let mut seeds = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--bind" => bind_addr = args.next(),
            "--cluster" => cluster_name = args.next(),
            "--node" => node_name = args.next(),
            "--seed" => seeds.push(args.next().unwrap_or_else(|| usage())),
            _ => usage(),
        }
    }

    let (Some(bind_addr), Some(cluster_name), Some(node_name)) = (bind_addr, cluster_name, node_name) else {
        usage();
    };
    let bind_addr: std::net::SocketAddr = bind_addr.parse().unwrap_or_else(|e| {
        eprintln!("invalid --bind address: {e}");
        std::process::exit(2);
    });

    let config = NodeConfig {
        repl: Config::default(),
        bind_addr,
        seeds,
    };

    let mut node = Node::bootstrap(config, Role::Member, LoggingApplier).expect("failed to bootstrap node");
    node.connect(&cluster_name, &node_name).expect("failed to connect");

    tracing::info!(addr = ?node.local_addr(), "node running");
    loop {
        if let Err(e) = node.run_one() {
            tracing::error!(error = ?e, "reactor iteration failed");
            break;
        }
    }
}
