use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct HttpServerConfig {
    /// The host to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path of the WebSocket session endpoint.
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_path: default_session_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7878
}

fn default_session_path() -> String {
    "/mcp".to_string()
}
