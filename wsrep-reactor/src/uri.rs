// Transport URIs, per the recognised configuration surface:
// tcp://host:port, ssl://host:port, udp://host:port with options
// socket.if_addr, socket.ssl_cipher, socket.ssl_compression (carried
// through unparsed as opaque key=value pairs; the caller — wsrep-repl's
// config loader — knows what to do with them).

use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};

use wsrep_base::{bad_request, Result};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scheme {
    Tcp,
    Ssl,
    Udp,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransportUri {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub options: BTreeMap<String, String>,
}

impl TransportUri {
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme_str, rest) = s
            .split_once("://")
            .ok_or_else(|| bad_request(format!("missing scheme in transport uri: {s}")))?;
        let scheme = match scheme_str {
            "tcp" => Scheme::Tcp,
            "ssl" => Scheme::Ssl,
            "udp" => Scheme::Udp,
            other => return Err(bad_request(format!("unknown transport scheme: {other}"))),
        };
        let (authority, query) = match rest.split_once('?') {
            Some((a, q)) => (a, Some(q)),
            None => (rest, None),
        };
        let (host, port_str) = authority
            .rsplit_once(':')
            .ok_or_else(|| bad_request(format!("missing port in transport uri: {s}")))?;
        let port: u16 = port_str
            .parse()
            .map_err(|_| bad_request(format!("invalid port in transport uri: {s}")))?;
        let mut options = BTreeMap::new();
        if let Some(q) = query {
            for pair in q.split('&').filter(|p| !p.is_empty()) {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                options.insert(k.to_string(), v.to_string());
            }
        }
        Ok(TransportUri {
            scheme,
            host: host.to_string(),
            port,
            options,
        })
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .to_socket_addrs()
            .map_err(|e| bad_request(format!("cannot resolve {}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| bad_request(format!("no address for {}:{}", self.host, self.port)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_plain_tcp() {
        let u = TransportUri::parse("tcp://10.0.0.1:4567").unwrap();
        assert_eq!(u.scheme, Scheme::Tcp);
        assert_eq!(u.host, "10.0.0.1");
        assert_eq!(u.port, 4567);
        assert!(u.options.is_empty());
    }

    #[test]
    fn parses_ssl_with_options() {
        let u = TransportUri::parse("ssl://db1:4567?socket.ssl_cipher=AES128-SHA&socket.ssl_compression=0")
            .unwrap();
        assert_eq!(u.scheme, Scheme::Ssl);
        assert_eq!(u.option("socket.ssl_cipher"), Some("AES128-SHA"));
        assert_eq!(u.option("socket.ssl_compression"), Some("0"));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(TransportUri::parse("http://host:80").is_err());
    }

    #[test]
    fn rejects_missing_port() {
        assert!(TransportUri::parse("tcp://host").is_err());
    }
}
