use serde_json::{json, Value};
use waypoint_search::SearchError;
use waypoint_upstream::UpstreamError;

/// JSON-RPC reserved error codes plus the server's domain codes.
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Domain codes inside the implementation-defined server range.
    pub const NOT_FOUND: i64 = -32001;
    pub const UNAUTHORIZED: i64 = -32002;
    pub const RATE_LIMITED: i64 = -32003;
    pub const TIMEOUT: i64 = -32004;
    pub const UPSTREAM_ERROR: i64 = -32005;

    /// Request was cancelled by the client.
    pub const REQUEST_CANCELLED: i64 = -32800;
}

/// An error destined for a JSON-RPC error response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::new(codes::PARSE_ERROR, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    /// Invalid params, with a JSON-Pointer-like path into the offending
    /// parameter.
    pub fn invalid_params(message: impl Into<String>, path: Option<&str>) -> Self {
        let mut error = Self::new(codes::INVALID_PARAMS, message);
        if let Some(path) = path {
            error.data = Some(json!({ "path": path }));
        }
        error
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL_ERROR, message)
    }

    pub fn cancelled() -> Self {
        Self::new(codes::REQUEST_CANCELLED, "Request cancelled")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(codes::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(codes::UNAUTHORIZED, message)
    }
}

impl From<UpstreamError> for RpcError {
    fn from(err: UpstreamError) -> Self {
        match &err {
            UpstreamError::Unauthorized => Self::new(codes::UNAUTHORIZED, err.to_string()),
            UpstreamError::NotFound(_) => Self::new(codes::NOT_FOUND, err.to_string()),
            UpstreamError::RateLimited { .. } => Self::new(codes::RATE_LIMITED, err.to_string()),
            UpstreamError::Timeout => Self::new(codes::TIMEOUT, err.to_string()),
            _ => Self::new(codes::UPSTREAM_ERROR, err.to_string()),
        }
    }
}

impl From<SearchError> for RpcError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::Validation(message) => Self::invalid_params(message.clone(), None),
            SearchError::Timeout(_) => Self::new(codes::TIMEOUT, err.to_string()),
            SearchError::Upstream(upstream) => upstream.clone().into(),
            SearchError::Shaping(_) => Self::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_errors_map_to_domain_codes() {
        let err: RpcError = UpstreamError::Unauthorized.into();
        assert_eq!(err.code, codes::UNAUTHORIZED);

        let err: RpcError = UpstreamError::NotFound("issue x".to_string()).into();
        assert_eq!(err.code, codes::NOT_FOUND);

        let err: RpcError = UpstreamError::RateLimited { reset_in_seconds: 90 }.into();
        assert_eq!(err.code, codes::RATE_LIMITED);
    }

    #[test]
    fn validation_errors_become_invalid_params() {
        let err: RpcError = SearchError::Validation("bad limit".to_string()).into();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.message, "bad limit");
    }

    #[test]
    fn invalid_params_carries_a_pointer_path() {
        let err = RpcError::invalid_params("missing", Some("/clientInfo/name"));
        assert_eq!(err.data, Some(json!({ "path": "/clientInfo/name" })));
    }
}
