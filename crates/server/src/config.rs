//! Server configuration from environment variables.

use std::str::FromStr;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 5000;
pub const DEFAULT_SOCKET_PORT: u16 = 3001;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// Port of the HTTP API.
    pub api_port: u16,
    /// Port of the realtime broker.
    pub socket_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_port: DEFAULT_API_PORT,
            socket_port: DEFAULT_SOCKET_PORT,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SPEAKSPACE_HOST`: bind address (default: "0.0.0.0")
    /// - `PORT`: HTTP API port (default: 5000)
    /// - `SOCKET_PORT`: realtime broker port (default: 3001)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("SPEAKSPACE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            api_port: parse_or("PORT", lookup("PORT"), DEFAULT_API_PORT),
            socket_port: parse_or("SOCKET_PORT", lookup("SOCKET_PORT"), DEFAULT_SOCKET_PORT),
        }
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.socket_port)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}, using {}", key, raw, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.api_addr(), "0.0.0.0:5000");
        assert_eq!(config.socket_addr(), "0.0.0.0:3001");
    }

    #[test]
    fn test_overrides_and_bad_values() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SPEAKSPACE_HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("SOCKET_PORT", "not-a-port"),
        ]));
        assert_eq!(config.api_addr(), "127.0.0.1:8080");
        assert_eq!(config.socket_port, DEFAULT_SOCKET_PORT);
    }
}
