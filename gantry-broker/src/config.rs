//! Broker node configuration.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use gantry_mq::queue::DEFAULT_POP_TIMEOUT;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The advertised address is not of the form `host:port`.
    #[error("invalid broker address {0:?}: expected host:port")]
    InvalidAddress(String),
}

/// Settings for one broker node.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Coordination service hosts, as `host:port` entries.
    pub coordination_hosts: Vec<String>,
    /// Coordination session timeout.
    pub coordination_timeout: Duration,
    /// Advertised `host:port` other members and clients reach us at.
    pub address: String,
    /// Port the broker binds; defaults to the port in `address`.
    pub port: u16,
    /// Wait budget for a client long-poll.
    pub pop_timeout: Duration,
    /// Allocate a fresh id block when fewer than this many ids remain.
    pub id_block_low_water: u64,
}

impl BrokerConfig {
    /// Build a config advertising `address`, deriving the bind port from it.
    pub fn new(address: impl Into<String>) -> Result<Self, ConfigError> {
        let address = address.into();
        let port = parse_port(&address)?;
        Ok(Self {
            coordination_hosts: vec!["localhost:2181".to_string()],
            coordination_timeout: Duration::from_millis(3000),
            address,
            port,
            pop_timeout: DEFAULT_POP_TIMEOUT,
            id_block_low_water: 4096,
        })
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            coordination_hosts: vec!["localhost:2181".to_string()],
            coordination_timeout: Duration::from_millis(3000),
            address: "localhost:6783".to_string(),
            port: 6783,
            pop_timeout: DEFAULT_POP_TIMEOUT,
            id_block_low_water: 4096,
        }
    }
}

fn parse_port(address: &str) -> Result<u16, ConfigError> {
    address
        .rsplit(':')
        .next()
        .and_then(|port| port.parse().ok())
        .ok_or_else(|| ConfigError::InvalidAddress(address.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests are allowed to use unwrap for simplicity
mod tests {
    use super::*;

    #[test]
    fn port_comes_from_the_address() {
        let config = BrokerConfig::new("10.1.2.3:7000").unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.address, "10.1.2.3:7000");
    }

    #[test]
    fn bad_addresses_are_rejected() {
        assert!(matches!(
            BrokerConfig::new("nohost"),
            Err(ConfigError::InvalidAddress(_))
        ));
        assert!(matches!(
            BrokerConfig::new("host:notaport"),
            Err(ConfigError::InvalidAddress(_))
        ));
    }

    #[test]
    fn defaults_match_the_documented_flags() {
        let config = BrokerConfig::default();
        assert_eq!(config.coordination_hosts, vec!["localhost:2181".to_string()]);
        assert_eq!(config.coordination_timeout, Duration::from_millis(3000));
        assert_eq!(config.pop_timeout, Duration::from_millis(5000));
    }
}
