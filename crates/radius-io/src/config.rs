//! JSON-loadable configuration for clients, servers and proxies.

use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid address: {0}")]
    Address(#[from] AddrParseError),
}

/// Client-side knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Local bind address; port 0 lets the OS choose.
    #[serde(default = "default_client_bind")]
    pub bind_address: String,

    /// Attempts per request before failing with a timeout.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Per-attempt wait in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Server-side knobs. Each port gets its own server instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Authentication port (RFC 2865).
    #[serde(default = "default_auth_port")]
    pub auth_port: u16,

    /// Accounting port (RFC 2866).
    #[serde(default = "default_acct_port")]
    pub acct_port: u16,

    /// Proxy listen port.
    #[serde(default = "default_proxy_port")]
    pub proxy_port: u16,

    /// Duplicate-detection window in milliseconds.
    #[serde(default = "default_dedup_ttl_ms")]
    pub dedup_ttl_ms: u64,

    /// Bound on cached responses.
    #[serde(default = "default_dedup_max_entries")]
    pub dedup_max_entries: usize,

    /// Hard per-packet handler budget in milliseconds.
    #[serde(default = "default_handler_budget_ms")]
    pub handler_budget_ms: u64,
}

fn default_client_bind() -> String {
    "0.0.0.0:0".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_listen_address() -> String {
    "0.0.0.0".to_string()
}

fn default_auth_port() -> u16 {
    1812
}

fn default_acct_port() -> u16 {
    1813
}

fn default_proxy_port() -> u16 {
    1814
}

fn default_dedup_ttl_ms() -> u64 {
    30_000
}

fn default_dedup_max_entries() -> usize {
    10_000
}

fn default_handler_budget_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            bind_address: default_client_bind(),
            max_attempts: default_max_attempts(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_address: default_listen_address(),
            auth_port: default_auth_port(),
            acct_port: default_acct_port(),
            proxy_port: default_proxy_port(),
            dedup_ttl_ms: default_dedup_ttl_ms(),
            dedup_max_entries: default_dedup_max_entries(),
            handler_budget_ms: default_handler_budget_ms(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        Ok(self.bind_address.parse()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }

    pub fn auth_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.listen_address.parse()?;
        Ok(SocketAddr::new(ip, self.auth_port))
    }

    pub fn acct_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.listen_address.parse()?;
        Ok(SocketAddr::new(ip, self.acct_port))
    }

    pub fn proxy_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self.listen_address.parse()?;
        Ok(SocketAddr::new(ip, self.proxy_port))
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms)
    }

    pub fn handler_budget(&self) -> Duration {
        Duration::from_millis(self.handler_budget_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.auth_port, 1812);
        assert_eq!(config.acct_port, 1813);
        assert_eq!(config.proxy_port, 1814);
        assert_eq!(config.dedup_ttl(), Duration::from_secs(30));
        assert_eq!(config.handler_budget(), Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"listen_address": "127.0.0.1", "auth_port": 11812, "dedup_ttl_ms": 5000}"#)
                .unwrap();
        assert_eq!(config.auth_addr().unwrap().to_string(), "127.0.0.1:11812");
        assert_eq!(config.dedup_ttl(), Duration::from_millis(5000));
    }

    #[test]
    fn test_client_defaults() {
        let config: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(3));
    }
}
