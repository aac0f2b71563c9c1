use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Authentication scheme for the upstream API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    #[default]
    ApiKey,
    Oauth,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct UpstreamConfig {
    /// The upstream GraphQL endpoint. A single POST endpoint accepting
    /// `{"query": ..., "variables": ...}` bodies.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Which authentication header form to use. API keys are sent raw in the
    /// `Authorization` header; OAuth tokens are sent as `Bearer <token>`.
    #[serde(default)]
    pub auth_type: AuthType,

    /// API key, required when `auth_type` is `api_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// OAuth access token, required when `auth_type` is `oauth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,

    /// Per-request timeout for upstream calls, in seconds.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum retry attempts for retryable upstream failures (transport
    /// errors and 5xx responses).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries, in milliseconds.
    /// The actual delay is sampled uniformly in `[0, base * 2^attempt]`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Hourly request quota assumed when the upstream does not report one.
    #[serde(default = "default_rate_limit_per_hour")]
    pub rate_limit_per_hour: u32,

    /// Limits the concurrent amount of in-flight requests to the upstream.
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
}

impl UpstreamConfig {
    /// The credential matching `auth_type` must be present.
    pub fn validate(&self) -> Result<(), String> {
        match self.auth_type {
            AuthType::ApiKey if self.api_key.is_none() => {
                Err("api_key is required when auth_type is api_key".to_string())
            }
            AuthType::Oauth if self.oauth_token.is_none() => {
                Err("oauth_token is required when auth_type is oauth".to_string())
            }
            _ => Ok(()),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            auth_type: AuthType::default(),
            api_key: None,
            oauth_token: None,
            timeout_seconds: default_timeout_seconds(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            rate_limit_per_hour: default_rate_limit_per_hour(),
            concurrent_requests: default_concurrent_requests(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.tracker.example/graphql".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_rate_limit_per_hour() -> u32 {
    8000
}

fn default_concurrent_requests() -> usize {
    10
}
