use std::env;
use std::path::PathBuf;

/// Runtime configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, e.g. `http://localhost:3000`.
    pub server_url: String,
    /// Override for the client-side data directory.
    pub data_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let server_url = env::var("HEALTHLINK_SERVER_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());
        let data_dir = env::var("HEALTHLINK_DATA_DIR").ok().map(PathBuf::from);
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            data_dir,
        }
    }

    pub fn new(server_url: impl Into<String>) -> Self {
        let server_url: String = server_url.into();
        Self {
            server_url: server_url.trim_end_matches('/').to_string(),
            data_dir: None,
        }
    }

    /// Base URL for REST calls; the backend mounts everything under `/api`.
    pub fn api_base(&self) -> String {
        format!("{}/api", self.server_url)
    }

    /// WebSocket endpoint derived from the server origin.
    pub fn socket_url(&self) -> String {
        let origin = if let Some(rest) = self.server_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.server_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            format!("ws://{}", self.server_url)
        };
        format!("{origin}/ws")
    }
}
