use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listening port, high enough to not need elevated privileges.
pub const DEFAULT_PORT: u16 = 8053;

pub const DEFAULT_UPSTREAM: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), 53);

/// Largest datagram read from either socket; anything longer is cut off.
pub const MAX_PACKET_SIZE: usize = 512;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the server listens on for client queries.
    pub listen: SocketAddr,

    /// Resolver cache misses are forwarded to.
    pub upstream: SocketAddr,

    /// Read timeout on the upstream socket. `None` waits forever.
    pub upstream_timeout: Option<Duration>,
}

impl ServerConfig {
    pub fn with_port(port: u16) -> Self {
        ServerConfig {
            listen: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port),
            ..Default::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DEFAULT_PORT),
            upstream: DEFAULT_UPSTREAM,
            upstream_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.listen.port(), 8053);
        assert!(config.listen.ip().is_unspecified());
        assert_eq!(config.upstream, "8.8.8.8:53".parse::<SocketAddr>().unwrap());
        assert!(config.upstream_timeout.is_none());
    }

    #[test]
    fn test_with_port() {
        let config = ServerConfig::with_port(5300);

        assert_eq!(config.listen.port(), 5300);
        assert_eq!(config.upstream, DEFAULT_UPSTREAM);
    }
}
