//! Client configuration from environment variables.

use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:3001";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the HTTP API (auth routes, health check).
    pub api_url: String,
    /// Base URL of the realtime broker. May use http(s) or ws(s).
    pub socket_url: String,
    /// Directory for persisted state. `None` means the platform config dir.
    pub storage_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            storage_dir: None,
        }
    }
}

impl ClientConfig {
    /// Parse configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SPEAKSPACE_API_URL`: HTTP API base (default: "http://localhost:5000")
    /// - `SPEAKSPACE_SOCKET_URL`: realtime broker base (default: "http://localhost:3001")
    /// - `SPEAKSPACE_STORAGE_DIR`: directory for the persisted identity
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("SPEAKSPACE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let socket_url = std::env::var("SPEAKSPACE_SOCKET_URL")
            .unwrap_or_else(|_| DEFAULT_SOCKET_URL.to_string());
        let storage_dir = std::env::var_os("SPEAKSPACE_STORAGE_DIR").map(PathBuf::from);

        Self {
            api_url,
            socket_url,
            storage_dir,
        }
    }

    /// WebSocket form of `socket_url`.
    pub fn ws_base_url(&self) -> String {
        http_to_ws(&self.socket_url)
    }
}

/// Convert HTTP/HTTPS URL to WS/WSS. Other schemes are returned unchanged.
pub fn http_to_ws(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}
