//! Top-level entry point: wires `wsrep-reactor` sockets to
//! `wsrep-gcomm`/`wsrep-gcs`/`wsrep-gcache`/`wsrep-cert`/`wsrep-repl`
//! into a runnable node — the thing that collects every resource a
//! replica needs to function — kept deliberately small: this crate is
//! wiring, not a new layer of protocol logic.

mod node;

pub use node::{Node, NodeConfig};
pub use wsrep_cert::{WriteSet, WriteSetFlags};
pub use wsrep_repl::{Apply, Config, Role};
