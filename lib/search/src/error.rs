use waypoint_upstream::UpstreamError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search query: {0}")]
    Validation(String),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("Search timed out after {0} seconds")]
    Timeout(u64),
    #[error("Failed to shape search response: {0}")]
    Shaping(String),
}
