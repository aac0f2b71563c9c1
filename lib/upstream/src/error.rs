#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    #[error("Invalid upstream API credentials")]
    Unauthorized,
    #[error("Not found upstream: {0}")]
    NotFound(String),
    #[error("Upstream API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Upstream API errors: {0}")]
    Graphql(String),
    #[error("Failed to send request to upstream: {0}")]
    Transport(String),
    #[error("Upstream request timed out")]
    Timeout,
    #[error("Rate limit exceeded, reset in {reset_in_seconds} seconds")]
    RateLimited { reset_in_seconds: u64 },
    #[error("Upstream mutation {0} reported failure")]
    MutationFailed(String),
    #[error("Unexpected upstream response shape: {0}")]
    Shape(String),
}

impl UpstreamError {
    /// Transport faults and 5xx responses are retried with backoff.
    /// Auth failures, missing resources, and GraphQL-level errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Transport(_) => true,
            UpstreamError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
