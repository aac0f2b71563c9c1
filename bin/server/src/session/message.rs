/// JSON-RPC 2.0 message envelope for the session transport, one JSON
/// document per frame.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

/// Request/response correlation id: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::String(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<RpcError> for ErrorObject {
    fn from(err: RpcError) -> Self {
        Self {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

/// What a message is. Exactly one kind can be inferred from a valid
/// envelope; anything hybrid is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    ErrorResponse,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcMessage {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorObject>,
}

impl JsonRpcMessage {
    pub fn request(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: Some(method.into()),
            params,
            result: None,
            error: None,
        }
    }

    pub fn response(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: None,
            params: None,
            result: Some(result),
            error: None,
        }
    }

    pub fn error_response(id: Option<RequestId>, error: impl Into<ErrorObject>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: None,
            params: None,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Parse one frame. A syntactically broken frame is a parse error; a
    /// well-formed frame with the wrong protocol version is an invalid
    /// request.
    pub fn parse(frame: &str) -> Result<Self, RpcError> {
        let message: JsonRpcMessage = serde_json::from_str(frame)
            .map_err(|e| RpcError::parse_error(format!("Invalid JSON: {e}")))?;
        if message.jsonrpc != JSONRPC_VERSION {
            return Err(RpcError::invalid_request("JSON-RPC version must be 2.0"));
        }
        Ok(message)
    }

    pub fn serialize(&self) -> String {
        // Serialization of this envelope cannot fail.
        serde_json::to_string(self).unwrap()
    }

    /// Infer the message kind. A message mixing `method` with `result` or
    /// `error`, or carrying both `result` and `error`, is invalid.
    pub fn kind(&self) -> MessageKind {
        match (&self.method, &self.id, &self.result, &self.error) {
            (Some(_), Some(_), None, None) => MessageKind::Request,
            (Some(_), None, None, None) => MessageKind::Notification,
            (None, Some(_), Some(_), None) => MessageKind::Response,
            (None, _, None, Some(_)) => MessageKind::ErrorResponse,
            _ => MessageKind::Invalid,
        }
    }
}
