//! Server configuration

use crate::error::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Port the server has always listened on
pub const DEFAULT_PORT: u16 = 4544;

/// TxVault server configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub max_connections: usize,
    /// Longest accepted request line in bytes, terminator included
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            max_connections: 1000,
            max_line_length: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file; missing fields keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "127.0.0.1:4544");
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_line_length, 65536);
    }

    #[test]
    fn test_partial_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "bind_addr": "0.0.0.0:9000" }}"#).unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.max_line_length, 65536);
    }

    #[test]
    fn test_invalid_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not json").unwrap();

        assert!(ServerConfig::from_file(file.path()).is_err());
        assert!(ServerConfig::from_file("/nonexistent/txvault.json").is_err());
    }
}
