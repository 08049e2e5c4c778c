//! # Quill configuration
//!
//! TOML-based configuration with full defaults: an empty file (or no file at
//! all) yields a working local resolver talking to the root daemon and stub
//! on their conventional loopback ports.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is structurally valid but semantically wrong.
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// No configuration file was found.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),
}

/// Result alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,

    /// Listener addresses.
    pub listeners: ListenerConfig,

    /// Resolver endpoints and limits.
    pub resolver: ResolverConfig,

    /// DNSSEC validation knobs.
    pub dnssec: DnssecConfig,

    /// Logging.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.listeners.udp.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "listeners.udp",
                message: "at least one UDP listener is required".to_string(),
            });
        }
        if self.resolver.stub_upstreams.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "resolver.stub_upstreams",
                message: "at least one stub upstream is required".to_string(),
            });
        }
        if self.resolver.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "resolver.timeout_ms",
                message: "timeout must be non-zero".to_string(),
            });
        }
        if self.dnssec.min_rsa_key_size < 512 {
            return Err(ConfigError::InvalidValue {
                field: "dnssec.min_rsa_key_size",
                message: "minimum RSA key size below 512 bits is meaningless".to_string(),
            });
        }
        Ok(())
    }
}

/// Server identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Human-readable instance name.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "quill".to_string(),
        }
    }
}

/// Listener addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// UDP listeners serving DNS.
    pub udp: Vec<SocketAddr>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            udp: vec![default_addr("127.0.0.1:9053")],
        }
    }
}

/// Resolver endpoints and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// The trusted root zone endpoint (the local root daemon).
    pub root_addr: SocketAddr,

    /// Upstream recursive resolvers backing the stub.
    pub stub_upstreams: Vec<SocketAddr>,

    /// Per-exchange stub timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root_addr: default_addr("127.0.0.1:9591"),
            stub_upstreams: vec![default_addr("127.0.0.1:9892")],
            timeout_ms: 5000,
        }
    }
}

/// DNSSEC validation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnssecConfig {
    /// Minimum RSA modulus size in bits for a secure result.
    pub min_rsa_key_size: usize,
}

impl Default for DnssecConfig {
    fn default() -> Self {
        Self {
            min_rsa_key_size: 2048,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,

    /// Log format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

fn default_addr(addr: &str) -> SocketAddr {
    addr.parse().expect("static address")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.name, "quill");
        assert_eq!(config.dnssec.min_rsa_key_size, 2048);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [resolver]
            root_addr = "127.0.0.1:5350"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.resolver.root_addr, default_addr("127.0.0.1:5350"));
        // Untouched sections keep their defaults.
        assert_eq!(config.resolver.timeout_ms, 5000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "text");
        config.validate().unwrap();
    }

    #[test]
    fn validation_catches_empty_listeners() {
        let mut config = Config::default();
        config.listeners.udp.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "listeners.udp", .. })
        ));
    }

    #[test]
    fn validation_catches_zero_timeout() {
        let mut config = Config::default();
        config.resolver.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_reported() {
        let err = Config::from_file(Path::new("/nonexistent/quill.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }
}
