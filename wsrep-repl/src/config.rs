// Parses the recognised configuration key set into nested,
// independently-defaultable sections, one sub-struct per key prefix —
// each `#[serde(default, deny_unknown_fields)]` so a partial document
// still produces a complete, sane config — the way production config
// modules build a typed struct out of a flat key/value wire format.
// `Config::from_map` is the loading path real deployments use: a flat
// `HashMap<String, String>` of dotted keys, with a human-readable
// parse error for any malformed or unrecognised one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use wsrep_base::{bad_request, Duration, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CommitOrder {
    /// Out-of-order commit: appliers may commit ahead of an
    /// earlier-seqno write-set once the certifier has proven the two
    /// share no keys.
    Oooc,
    /// Appliers always commit in strict seqno order, even when two
    /// write-sets are known non-conflicting.
    Bypass,
}

impl Default for CommitOrder {
    fn default() -> Self {
        CommitOrder::Oooc
    }
}

impl FromStr for CommitOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s.to_ascii_uppercase().as_str() {
            "OOOC" => Ok(CommitOrder::Oooc),
            "BYPASS" => Ok(CommitOrder::Bypass),
            other => Err(format!("expected `OOOC` or `BYPASS`, got {other:?}")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GmCastConfig {
    pub group: String,
}

impl Default for GmCastConfig {
    fn default() -> Self {
        GmCastConfig { group: String::new() }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PcConfig {
    pub bootstrap: bool,
    pub weight: u32,
}

impl Default for PcConfig {
    fn default() -> Self {
        PcConfig { bootstrap: false, weight: 1 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvsConfig {
    pub send_window: usize,
    pub user_send_window: usize,
    pub join_retrans_period: Duration,
}

impl Default for EvsConfig {
    fn default() -> Self {
        EvsConfig {
            send_window: 512,
            user_send_window: 256,
            join_retrans_period: Duration::from_millis(1000),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GcacheConfig {
    pub size: usize,
    pub page_size: u64,
    pub dir: PathBuf,
    pub name: String,
}

impl Default for GcacheConfig {
    fn default() -> Self {
        GcacheConfig {
            size: 128 * 1024 * 1024,
            page_size: 64 * 1024 * 1024,
            dir: std::env::temp_dir().join("wsrep-gcache"),
            name: "gcache".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CertConfig {
    pub log_conflicts: bool,
}

impl Default for CertConfig {
    fn default() -> Self {
        CertConfig { log_conflicts: false }
    }
}

/// Trailing certification window, in seqnos behind `last_committed`.
/// Not a recognised config key (the named key set has no `cert.*`
/// entry for it); internal tuning only.
pub const DEFAULT_TRAILING_WINDOW: i64 = 1_000_000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplConfig {
    pub commit_order: CommitOrder,
    pub causal_read_timeout: Duration,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            commit_order: CommitOrder::default(),
            causal_read_timeout: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketConfig {
    pub ssl: bool,
    pub ssl_key: Option<String>,
    pub ssl_cert: Option<String>,
    pub ssl_ca: Option<String>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        SocketConfig { ssl: false, ssl_key: None, ssl_cert: None, ssl_ca: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cluster_name: String,
    pub node_name: String,
    pub gmcast: GmCastConfig,
    pub pc: PcConfig,
    pub evs: EvsConfig,
    pub gcache: GcacheConfig,
    pub cert: CertConfig,
    pub repl: ReplConfig,
    pub socket: SocketConfig,
    pub base_host: String,
    pub base_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_name: String::new(),
            node_name: String::new(),
            gmcast: GmCastConfig::default(),
            pc: PcConfig::default(),
            evs: EvsConfig::default(),
            gcache: GcacheConfig::default(),
            cert: CertConfig::default(),
            repl: ReplConfig::default(),
            socket: SocketConfig::default(),
            base_host: String::new(),
            base_port: 4567,
        }
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| bad_request(format!("invalid value for `{key}`: {raw:?} ({e})")))
}

fn parse_duration_ms(key: &str, raw: &str) -> Result<Duration> {
    let ms: i64 = parse_value(key, raw)?;
    Ok(Duration::from_millis(ms))
}

impl Config {
    /// Builds a `Config` from the recognised flat key set
    /// (`gmcast.group`, `pc.bootstrap`, `pc.weight`, `evs.send_window`,
    /// `evs.user_send_window`, `evs.join_retrans_period`, `gcache.size`,
    /// `gcache.page_size`, `gcache.dir`, `gcache.name`,
    /// `cert.log_conflicts`, `repl.commit_order`,
    /// `repl.causal_read_timeout`, `socket.ssl`, `socket.ssl_key`,
    /// `socket.ssl_cert`, `socket.ssl_ca`, `base_host`, `base_port`) —
    /// the wire format real deployments hand this engine. Any other key,
    /// or a value that fails to parse for its field's type, is a
    /// `BadRequest` naming the offending key.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Config> {
        let mut config = Config::default();
        for (key, raw) in map {
            match key.as_str() {
                "gmcast.group" => config.gmcast.group = raw.clone(),
                "pc.bootstrap" => config.pc.bootstrap = parse_value(key, raw)?,
                "pc.weight" => config.pc.weight = parse_value(key, raw)?,
                "evs.send_window" => config.evs.send_window = parse_value(key, raw)?,
                "evs.user_send_window" => config.evs.user_send_window = parse_value(key, raw)?,
                "evs.join_retrans_period" => config.evs.join_retrans_period = parse_duration_ms(key, raw)?,
                "gcache.size" => config.gcache.size = parse_value(key, raw)?,
                "gcache.page_size" => config.gcache.page_size = parse_value(key, raw)?,
                "gcache.dir" => config.gcache.dir = PathBuf::from(raw),
                "gcache.name" => config.gcache.name = raw.clone(),
                "cert.log_conflicts" => config.cert.log_conflicts = parse_value(key, raw)?,
                "repl.commit_order" => {
                    config.repl.commit_order = raw
                        .parse()
                        .map_err(|e| bad_request(format!("invalid value for `repl.commit_order`: {raw:?} ({e})")))?
                }
                "repl.causal_read_timeout" => config.repl.causal_read_timeout = parse_duration_ms(key, raw)?,
                "socket.ssl" => config.socket.ssl = parse_value(key, raw)?,
                "socket.ssl_key" => config.socket.ssl_key = Some(raw.clone()),
                "socket.ssl_cert" => config.socket.ssl_cert = Some(raw.clone()),
                "socket.ssl_ca" => config.socket.ssl_ca = Some(raw.clone()),
                "base_host" => config.base_host = raw.clone(),
                "base_port" => config.base_port = parse_value(key, raw)?,
                other => return Err(bad_request(format!("unrecognised configuration key `{other}`"))),
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn empty_map_yields_defaults() {
        let cfg = Config::from_map(&map(&[])).unwrap();
        assert_eq!(cfg.base_port, 4567);
        assert_eq!(cfg.repl.commit_order, CommitOrder::Oooc);
    }

    #[test]
    fn recognised_keys_populate_their_sub_struct() {
        let cfg = Config::from_map(&map(&[
            ("gmcast.group", "cluster1"),
            ("pc.bootstrap", "true"),
            ("pc.weight", "3"),
            ("evs.send_window", "128"),
            ("gcache.size", "1048576"),
            ("gcache.dir", "/var/lib/wsrep/gcache"),
            ("cert.log_conflicts", "true"),
            ("repl.commit_order", "bypass"),
            ("socket.ssl", "true"),
            ("base_host", "10.0.0.1"),
            ("base_port", "4568"),
        ]))
        .unwrap();
        assert_eq!(cfg.gmcast.group, "cluster1");
        assert!(cfg.pc.bootstrap);
        assert_eq!(cfg.pc.weight, 3);
        assert_eq!(cfg.evs.send_window, 128);
        assert_eq!(cfg.gcache.size, 1_048_576);
        assert_eq!(cfg.gcache.dir, PathBuf::from("/var/lib/wsrep/gcache"));
        assert!(cfg.cert.log_conflicts);
        assert_eq!(cfg.repl.commit_order, CommitOrder::Bypass);
        assert!(cfg.socket.ssl);
        assert_eq!(cfg.base_host, "10.0.0.1");
        assert_eq!(cfg.base_port, 4568);
    }

    #[test]
    fn unrecognised_key_is_a_readable_error() {
        let err = Config::from_map(&map(&[("gmcast.nonsense", "x")])).unwrap_err();
        assert!(format!("{err}").contains("unrecognised configuration key"));
    }

    #[test]
    fn malformed_value_names_the_key() {
        let err = Config::from_map(&map(&[("pc.weight", "not-a-number")])).unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("pc.weight"));
        assert!(msg.contains("not-a-number"));
    }
}
