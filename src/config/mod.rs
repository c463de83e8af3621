//! Configuration management.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`STP_*`)
//! - CLI arguments (see the `stp` binary)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StpError};
use crate::proxy::ProxyConfig;
use crate::transport::RECV_TIMEOUT_SECS;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Proxy configuration.
    #[serde(default)]
    pub proxy: ProxySettings,
}

/// Proxy section of the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxySettings {
    /// Host to accept clients on.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to accept clients on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upstream server address (`host:port`).
    #[serde(default = "default_upstream")]
    pub upstream: String,
    /// Bound on every blocking receive, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7891
}

fn default_upstream() -> String {
    "127.0.0.1:7890".to_string()
}

fn default_timeout() -> u64 {
    RECV_TIMEOUT_SECS
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: default_upstream(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| StpError::Internal(format!("failed to read config file: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| StpError::Internal(format!("failed to parse config: {e}")))
    }

    /// Load configuration from environment variables, starting from
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("STP_PROXY_HOST") {
            config.proxy.host = host;
        }
        if let Ok(port) = std::env::var("STP_PROXY_PORT") {
            if let Ok(port) = port.parse() {
                config.proxy.port = port;
            }
        }
        if let Ok(upstream) = std::env::var("STP_UPSTREAM") {
            config.proxy.upstream = upstream;
        }
        if let Ok(timeout) = std::env::var("STP_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse() {
                config.proxy.timeout_secs = timeout;
            }
        }

        config
    }

    /// Build the runtime proxy configuration.
    pub fn proxy_config(&self) -> Result<ProxyConfig> {
        let listen_addr = format!("{}:{}", self.proxy.host, self.proxy.port)
            .parse()
            .map_err(|e| StpError::Internal(format!("invalid listen address: {e}")))?;
        Ok(ProxyConfig {
            listen_addr,
            upstream_addr: self.proxy.upstream.clone(),
            recv_timeout: Duration::from_secs(self.proxy.timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.proxy.port, 7891);
        assert_eq!(config.proxy.upstream, "127.0.0.1:7890");
        assert_eq!(config.proxy.timeout_secs, 30);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[proxy]\nport = 9000\nupstream = \"example.org:7000\""
        )
        .unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.proxy.port, 9000);
        assert_eq!(config.proxy.upstream, "example.org:7000");
        // Unset fields fall back to defaults.
        assert_eq!(config.proxy.host, "127.0.0.1");
    }

    #[test]
    fn test_from_file_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[proxy\nport = ").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_proxy_config_conversion() {
        let config = Config::default();
        let proxy = config.proxy_config().unwrap();
        assert_eq!(proxy.listen_addr.port(), 7891);
        assert_eq!(proxy.recv_timeout, Duration::from_secs(30));
    }
}
