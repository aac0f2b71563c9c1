pub mod log;
pub mod search;
pub mod server;
pub mod upstream;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
    log::LoggingConfig, search::SearchSectionConfig, server::HttpServerConfig,
    upstream::UpstreamConfig,
};

/// Root configuration for the Waypoint server.
///
/// The core never reads files or environment variables itself; the embedder
/// deserializes a single document into this structure and hands it over at
/// startup. The structure is immutable afterwards.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WaypointConfig {
    /// The server logger configuration.
    ///
    /// The server is configured to be mostly silent (`info`) level, and will print only
    /// important messages, warnings, and errors.
    #[serde(default)]
    pub log: LoggingConfig,

    /// Configuration for the HTTP server/listener carrying the session transport.
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Configuration for the upstream project-management API client.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Configuration for the unified search engine, its cache, and its
    /// result optimizer/formatter.
    #[serde(default)]
    pub search: SearchSectionConfig,
}

impl WaypointConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    InvalidValue(String),
}

/// Parse a JSON configuration document into the root structure.
///
/// This is the only entry point the binary uses; file discovery and
/// environment merging belong to the embedder.
pub fn parse_json_config(raw: &str) -> Result<WaypointConfig, ConfigError> {
    let config: WaypointConfig = serde_json::from_str(raw)?;
    config.upstream.validate().map_err(ConfigError::InvalidValue)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_complete() {
        let config = parse_json_config(r#"{"upstream": {"api_key": "lin_api_test"}}"#).unwrap();
        assert_eq!(config.http.port, 7878);
        assert_eq!(config.upstream.concurrent_requests, 10);
        assert_eq!(config.search.cache.ttl_seconds, 300);
    }

    #[test]
    fn rejects_unknown_fields() {
        let result = parse_json_config(r#"{"upstrem": {}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_missing_credential() {
        let result = parse_json_config(r#"{"upstream": {}}"#);
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }
}
