//! Server Configuration
//!
//! Defaults overridden by environment variables (a `.env` file is loaded by
//! the binary). Invalid values are logged and ignored.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Session ticks per second
    pub tick_rate: u32,
    /// Maximum concurrent WebSocket connections
    pub max_connections: usize,
    /// Capacity of each per-connection outbound queue and the engine queue
    pub channel_capacity: usize,
    /// Server version string sent in `welcome`
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 8080,
            tick_rate: crate::TICK_RATE,
            max_connections: 1000,
            channel_capacity: 256,
            version: crate::VERSION.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("BIND_ADDRESS") {
            if let Ok(parsed) = addr.parse() {
                config.bind_address = parsed;
            } else {
                tracing::warn!("Invalid BIND_ADDRESS '{}', using default", addr);
            }
        }

        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.port = parsed,
                Ok(_) => tracing::warn!("PORT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid PORT '{}', using default", port),
            }
        }

        if let Some(rate) = lookup("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=240).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-240, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Some(max) = lookup("MAX_CONNECTIONS") {
            match max.parse::<usize>() {
                Ok(parsed) if parsed > 0 && parsed <= 100_000 => config.max_connections = parsed,
                Ok(_) => tracing::warn!("MAX_CONNECTIONS must be 1-100000, using default"),
                Err(_) => tracing::warn!("Invalid MAX_CONNECTIONS '{}', using default", max),
            }
        }

        if let Some(capacity) = lookup("CHANNEL_CAPACITY") {
            match capacity.parse::<usize>() {
                Ok(parsed) if parsed >= 8 => config.channel_capacity = parsed,
                Ok(_) => tracing::warn!("CHANNEL_CAPACITY must be >= 8, using default"),
                Err(_) => tracing::warn!("Invalid CHANNEL_CAPACITY '{}', using default", capacity),
            }
        }

        config
    }

    /// Address the listener binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        if self.max_connections == 0 {
            return Err("max_connections must be at least 1".to_string());
        }
        if self.channel_capacity == 0 {
            return Err("channel_capacity must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.tick_rate, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDRESS", "127.0.0.1"),
            ("PORT", "9000"),
            ("TICK_RATE", "30"),
            ("MAX_CONNECTIONS", "50"),
            ("CHANNEL_CAPACITY", "64"),
        ]));
        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.tick_rate, 30);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("BIND_ADDRESS", "not-an-ip"),
            ("PORT", "0"),
            ("TICK_RATE", "1000"),
            ("MAX_CONNECTIONS", "lots"),
            ("CHANNEL_CAPACITY", "2"),
        ]));
        let defaults = ServerConfig::default();
        assert_eq!(config.bind_address, defaults.bind_address);
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.tick_rate, defaults.tick_rate);
        assert_eq!(config.max_connections, defaults.max_connections);
        assert_eq!(config.channel_capacity, defaults.channel_capacity);
    }

    #[test]
    fn test_load_or_default() {
        let config = ServerConfig::load_or_default();
        assert!(config.port > 0);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let config = ServerConfig { max_connections: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}
