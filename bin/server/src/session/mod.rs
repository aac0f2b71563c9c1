pub mod message;

use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dashmap::{mapref::entry::Entry, DashMap};
use futures::FutureExt;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use waypoint_search::ResourceType;

use crate::error::{codes, RpcError};
use crate::registry::ResourceOperation;
use crate::session::message::{JsonRpcMessage, MessageKind, RequestId};
use crate::shared_state::SharedState;
use crate::sinks::{AuditEvent, AuditSeverity};
use crate::version::{ProtocolVersion, VersionRange};
use crate::{NAMESPACE, SERVER_NAME, SERVER_VENDOR, SERVER_VERSION};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    New,
    Initializing,
    Ready,
    Closing,
    Closed,
}

/// One client connection.
///
/// Owns the connection state machine, the in-flight request table, and the
/// outgoing frame channel. Requests are serviced as independent tasks, so
/// responses may leave in any order; each is correlated by id.
pub struct Session {
    pub id: Uuid,
    state: Mutex<SessionState>,
    protocol_version: Mutex<Option<ProtocolVersion>>,
    client_info: Mutex<Option<Value>>,
    in_flight: DashMap<RequestId, CancellationToken>,
    outgoing: mpsc::Sender<String>,
    shared: Arc<SharedState>,
}

impl Session {
    pub fn new(shared: Arc<SharedState>, outgoing: mpsc::Sender<String>) -> Arc<Self> {
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            state: Mutex::new(SessionState::New),
            protocol_version: Mutex::new(None),
            client_info: Mutex::new(None),
            in_flight: DashMap::new(),
            outgoing,
            shared,
        });
        info!("New session created: {}", session.id);
        session
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SessionState::Ready
    }

    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        *self
            .protocol_version
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    async fn send(&self, message: JsonRpcMessage) {
        if self.outgoing.send(message.serialize()).await.is_err() {
            debug!("Session {} outgoing channel closed", self.id);
        }
    }

    /// Handle one inbound frame. May spawn request tasks whose responses
    /// arrive on the outgoing channel later.
    pub async fn handle_frame(self: &Arc<Self>, frame: &str) {
        let message = match JsonRpcMessage::parse(frame) {
            Ok(message) => message,
            Err(err) => {
                self.send(JsonRpcMessage::error_response(None, err)).await;
                return;
            }
        };

        match message.kind() {
            MessageKind::Request => {
                // Kind inference guarantees both fields.
                let id = message.id.clone().unwrap();
                let method = message.method.clone().unwrap();
                self.handle_request(id, method, message.params).await;
            }
            MessageKind::Notification => {
                let method = message.method.as_deref().unwrap_or_default();
                self.handle_notification(method).await;
            }
            MessageKind::Response | MessageKind::ErrorResponse => {
                warn!(
                    "Session {} received an unexpected response frame, ignoring",
                    self.id
                );
            }
            MessageKind::Invalid => {
                self.send(JsonRpcMessage::error_response(
                    message.id,
                    RpcError::invalid_request("Message is neither request, response, nor notification"),
                ))
                .await;
            }
        }
    }

    async fn handle_request(self: &Arc<Self>, id: RequestId, method: String, params: Option<Value>) {
        if method == "initialize" {
            self.handle_initialize(id, params.unwrap_or(Value::Null)).await;
            return;
        }

        if method == "$/ping" {
            self.send(JsonRpcMessage::response(id, json!({ "pong": true })))
                .await;
            return;
        }

        // Before Ready only `initialize` and `$/ping` are served.
        if !self.is_ready() {
            self.send(JsonRpcMessage::error_response(
                Some(id),
                RpcError::invalid_request("Connection not initialized"),
            ))
            .await;
            return;
        }

        if let Some(internal) = method.strip_prefix("$/") {
            self.handle_internal(id, internal, params).await;
            return;
        }

        self.spawn_request(id, method, params.unwrap_or(Value::Null));
    }

    async fn handle_notification(self: &Arc<Self>, method: &str) {
        if method == "$/close" {
            self.close().await;
            return;
        }
        if !self.is_ready() {
            warn!(
                "Session {} received notification '{method}' before initialization, dropping",
                self.id
            );
            return;
        }
        warn!("No notification handler for method: {method}");
    }

    async fn handle_internal(self: &Arc<Self>, id: RequestId, method: &str, params: Option<Value>) {
        match method {
            "cancelRequest" => {
                let target = params
                    .as_ref()
                    .and_then(|p| p.get("id"))
                    .cloned()
                    .and_then(|v| serde_json::from_value::<RequestId>(v).ok());
                let Some(target) = target else {
                    self.send(JsonRpcMessage::error_response(
                        Some(id),
                        RpcError::invalid_params(
                            "Missing required parameter 'id' for cancelRequest",
                            Some("/id"),
                        ),
                    ))
                    .await;
                    return;
                };

                let cancelled = match self.in_flight.get(&target) {
                    Some(entry) => {
                        entry.value().cancel();
                        info!("Session {} cancelled request {target}", self.id);
                        true
                    }
                    None => false,
                };
                self.send(JsonRpcMessage::response(id, json!({ "cancelled": cancelled })))
                    .await;
            }
            other => {
                self.send(JsonRpcMessage::error_response(
                    Some(id),
                    RpcError::method_not_found(&format!("$/{other}")),
                ))
                .await;
            }
        }
    }

    async fn handle_initialize(self: &Arc<Self>, id: RequestId, params: Value) {
        match self.state() {
            SessionState::New => {}
            SessionState::Ready | SessionState::Initializing => {
                self.send(JsonRpcMessage::error_response(
                    Some(id),
                    RpcError::invalid_request("Connection already initialized"),
                ))
                .await;
                return;
            }
            SessionState::Closing | SessionState::Closed => return,
        }
        self.set_state(SessionState::Initializing);

        let validated = validate_initialize_params(&params);
        let (client_info, client_capabilities) = match validated {
            Ok(parts) => parts,
            Err(err) => {
                // Invalid initialize leaves the session receivable.
                self.set_state(SessionState::New);
                self.send(JsonRpcMessage::error_response(Some(id), err)).await;
                return;
            }
        };

        let version = match negotiate_version(&self.shared, &params) {
            Ok(version) => version,
            Err(err) => {
                self.set_state(SessionState::New);
                self.send(JsonRpcMessage::error_response(Some(id), err)).await;
                return;
            }
        };

        // Credential bind happens once, here.
        if let Some(api_key) = params.get("apiKey").and_then(Value::as_str) {
            if !self.shared.validator.validate(api_key).await {
                self.shared.audit.record(
                    AuditEvent::new(
                        "authzFailure",
                        AuditSeverity::Warning,
                        self.id.to_string(),
                        "initialize",
                    )
                    .with_details(json!({ "reason": "invalid api key" })),
                );
                self.send(JsonRpcMessage::error_response(
                    Some(id),
                    RpcError::unauthorized("Invalid API key"),
                ))
                .await;
                self.close().await;
                return;
            }
        }

        let capabilities = self.shared.capabilities.negotiate(&client_capabilities);

        info!(
            "Session {} initialized by client '{}' (protocol {})",
            self.id,
            client_info
                .get("name")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown"),
            version.as_str()
        );

        *self.client_info.lock().unwrap_or_else(|p| p.into_inner()) = Some(client_info);
        *self
            .protocol_version
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(version);
        self.set_state(SessionState::Ready);

        self.send(JsonRpcMessage::response(
            id,
            json!({
                "serverInfo": { "name": SERVER_NAME, "vendor": SERVER_VENDOR },
                "serverVersion": SERVER_VERSION,
                "protocolVersion": version.as_str(),
                "capabilities": capabilities,
            }),
        ))
        .await;
    }

    /// Run one request as an independent, cooperatively cancellable task.
    /// The in-flight entry is released exactly once: by this task, or by
    /// `close` draining the table (in which case no response is sent).
    fn spawn_request(self: &Arc<Self>, id: RequestId, method: String, params: Value) {
        let token = CancellationToken::new();
        match self.in_flight.entry(id.clone()) {
            Entry::Occupied(_) => {
                let session = self.clone();
                tokio::spawn(async move {
                    session
                        .send(JsonRpcMessage::error_response(
                            Some(id),
                            RpcError::invalid_request("Duplicate request id"),
                        ))
                        .await;
                });
                return;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(token.clone());
            }
        }

        let session = self.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            session.shared.metrics.request_started(&method);

            // A panicking handler still produces an error response and
            // releases its in-flight entry; the session stays open.
            let guarded = AssertUnwindSafe(dispatch(&session.shared, &method, params))
                .catch_unwind();
            let result = tokio::select! {
                _ = token.cancelled() => Err(RpcError::cancelled()),
                result = guarded => result.unwrap_or_else(|_| {
                    Err(RpcError::internal(format!("Handler for '{method}' panicked")))
                }),
            };

            session
                .shared
                .metrics
                .request_finished(&method, started.elapsed(), result.is_ok());

            // Gone from the table means the session closed underneath us;
            // nothing may leak after that.
            if session.in_flight.remove(&id).is_none() {
                return;
            }

            match result {
                Ok(result) => {
                    session.send(JsonRpcMessage::response(id, result)).await;
                }
                Err(err) => {
                    if err.code == codes::UNAUTHORIZED || err.code == codes::UPSTREAM_ERROR {
                        session.shared.audit.record(
                            AuditEvent::new(
                                if err.code == codes::UNAUTHORIZED {
                                    "authzFailure"
                                } else {
                                    "upstreamError"
                                },
                                AuditSeverity::Warning,
                                session.id.to_string(),
                                method.clone(),
                            )
                            .with_details(json!({ "message": err.message })),
                        );
                    }
                    session
                        .send(JsonRpcMessage::error_response(Some(id), err))
                        .await;
                }
            }
        });
    }

    /// Cancel all in-flight work and terminate. Idempotent.
    pub async fn close(&self) {
        if matches!(self.state(), SessionState::Closing | SessionState::Closed) {
            return;
        }
        self.set_state(SessionState::Closing);

        for entry in self.in_flight.iter() {
            entry.value().cancel();
        }
        self.in_flight.clear();

        self.set_state(SessionState::Closed);
        info!("Closed session {}", self.id);
    }
}

/// Required: `clientInfo.name` (string) and a `capabilities` object.
/// Optional `trace` must be one of off/messages/verbose.
fn validate_initialize_params(
    params: &Value,
) -> Result<(Value, Map<String, Value>), RpcError> {
    let Some(object) = params.as_object() else {
        return Err(RpcError::invalid_params(
            "Missing required parameters for initialize request",
            Some("/"),
        ));
    };

    let client_info = object
        .get("clientInfo")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            RpcError::invalid_params("'clientInfo' must be an object", Some("/clientInfo"))
        })?;
    if client_info.get("name").and_then(Value::as_str).is_none() {
        return Err(RpcError::invalid_params(
            "'clientInfo.name' is required",
            Some("/clientInfo/name"),
        ));
    }

    let capabilities = object
        .get("capabilities")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            RpcError::invalid_params("'capabilities' must be an object", Some("/capabilities"))
        })?;

    if let Some(trace) = object.get("trace") {
        let valid = trace
            .as_str()
            .map(|t| matches!(t, "off" | "messages" | "verbose"))
            .unwrap_or(false);
        if !valid {
            return Err(RpcError::invalid_params(
                "'trace' must be one of off, messages, verbose",
                Some("/trace"),
            ));
        }
    }

    Ok((Value::Object(client_info.clone()), capabilities.clone()))
}

/// Pick the protocol version: highest of the intersection with an
/// advertised set, highest supported inside an advertised range, or the
/// server's latest when the client stays silent.
fn negotiate_version(shared: &SharedState, params: &Value) -> Result<ProtocolVersion, RpcError> {
    let no_overlap = || RpcError::invalid_request("No compatible protocol version");

    if let Some(list) = params.get("protocolVersions").and_then(Value::as_array) {
        let client_versions: Vec<ProtocolVersion> = list
            .iter()
            .filter_map(Value::as_str)
            .filter_map(ProtocolVersion::parse)
            .collect();
        return shared
            .versions
            .negotiate_set(&client_versions)
            .ok_or_else(no_overlap);
    }

    if let Some(value) = params.get("protocolVersion") {
        if let Some(raw) = value.as_str() {
            let version = ProtocolVersion::parse(raw).ok_or_else(no_overlap)?;
            if !shared.versions.is_supported(version) {
                return Err(no_overlap());
            }
            return Ok(version);
        }
        if value.is_object() {
            let range: VersionRange = serde_json::from_value(value.clone()).map_err(|_| {
                RpcError::invalid_params(
                    "'protocolVersion' range must have a valid 'min'",
                    Some("/protocolVersion"),
                )
            })?;
            return shared.versions.negotiate_range(&range).ok_or_else(no_overlap);
        }
        return Err(RpcError::invalid_params(
            "'protocolVersion' must be a string or a range object",
            Some("/protocolVersion"),
        ));
    }

    shared.versions.latest().ok_or_else(no_overlap)
}

/// Method routing: tools by their registered names, resource operations as
/// `<ns>.<resource>.<operation>`.
async fn dispatch(shared: &Arc<SharedState>, method: &str, params: Value) -> Result<Value, RpcError> {
    if shared.tools.has(method) {
        return shared.tools.execute(method, params).await;
    }

    let prefix = format!("{NAMESPACE}.");
    if let Some(rest) = method.strip_prefix(&prefix) {
        if let Some((resource, operation)) = rest.rsplit_once('.') {
            let resource_type = ResourceType::from_str(resource)
                .map_err(|_| RpcError::method_not_found(method))?;
            let operation = ResourceOperation::parse(operation)
                .ok_or_else(|| RpcError::method_not_found(method))?;
            return shared.resources.dispatch(resource_type, operation, params).await;
        }
    }

    Err(RpcError::method_not_found(method))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ToolMetadata, ToolProvider};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use waypoint_config::WaypointConfig;

    struct SlowTool;

    #[async_trait]
    impl ToolProvider for SlowTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "test.slow".to_string(),
                description: "Sleeps before answering".to_string(),
                input_schema: None,
                output_schema: None,
                version: None,
            }
        }

        async fn execute(&self, _params: Value) -> Result<Value, RpcError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(json!({ "done": true }))
        }
    }

    fn test_state() -> Arc<SharedState> {
        let config: WaypointConfig = serde_json::from_value(json!({
            "upstream": {
                "endpoint": "http://127.0.0.1:9/graphql",
                "api_key": "test_api_key",
                "max_retries": 0,
            }
        }))
        .unwrap();
        let state = SharedState::new(config).unwrap();
        state.tools.register(Arc::new(SlowTool));
        state
    }

    fn test_session() -> (Arc<Session>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        (Session::new(test_state(), tx), rx)
    }

    async fn next_message(rx: &mut mpsc::Receiver<String>) -> JsonRpcMessage {
        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("channel closed");
        JsonRpcMessage::parse(&frame).unwrap()
    }

    async fn initialize(session: &Arc<Session>, rx: &mut mpsc::Receiver<String>) {
        session
            .handle_frame(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"probe"},"capabilities":{}}}"#,
            )
            .await;
        let response = next_message(rx).await;
        assert!(response.error.is_none(), "initialize failed: {response:?}");
    }

    #[tokio::test]
    async fn initialize_handshake_makes_session_ready() {
        let (session, mut rx) = test_session();
        assert_eq!(session.state(), SessionState::New);

        session
            .handle_frame(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"probe"},"capabilities":{}}}"#,
            )
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.id, Some(RequestId::Number(1)));
        let result = response.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(result["serverVersion"], SERVER_VERSION);
        assert!(result["capabilities"].is_object());
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.protocol_version(), Some(ProtocolVersion::V2_0));
    }

    #[tokio::test]
    async fn non_ping_requests_before_ready_get_invalid_request() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":5,"method":"tracker.search","params":{"query":"x"}}"#)
            .await;

        let response = next_message(&mut rx).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::INVALID_REQUEST);
        assert_eq!(error.message, "Connection not initialized");
        assert_eq!(response.id, Some(RequestId::Number(5)));
    }

    #[tokio::test]
    async fn ping_is_served_before_ready() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":"p","method":"$/ping"}"#)
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.result, Some(json!({ "pong": true })));
    }

    #[tokio::test]
    async fn invalid_initialize_params_report_a_pointer_path() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"capabilities":{}}}"#)
            .await;

        let response = next_message(&mut rx).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::INVALID_PARAMS);
        assert_eq!(error.data, Some(json!({ "path": "/clientInfo" })));
        // Session stays receivable.
        assert_eq!(session.state(), SessionState::New);
    }

    #[tokio::test]
    async fn invalid_trace_value_is_rejected() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"x"},"capabilities":{},"trace":"loud"}}"#,
            )
            .await;

        let response = next_message(&mut rx).await;
        let error = response.error.unwrap();
        assert_eq!(error.data, Some(json!({ "path": "/trace" })));
    }

    #[tokio::test]
    async fn version_mismatch_fails_initialize() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"x"},"capabilities":{},"protocolVersions":["0.9"]}}"#,
            )
            .await;

        let response = next_message(&mut rx).await;
        let error = response.error.unwrap();
        assert_eq!(error.code, codes::INVALID_REQUEST);
        assert_eq!(error.message, "No compatible protocol version");
        assert_eq!(session.state(), SessionState::New);
    }

    #[tokio::test]
    async fn version_range_negotiates_highest_supported() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"clientInfo":{"name":"x"},"capabilities":{},"protocolVersion":{"min":"1.0","max":"1.1"}}}"#,
            )
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.result.unwrap()["protocolVersion"], "1.1");
        assert_eq!(session.protocol_version(), Some(ProtocolVersion::V1_1));
    }

    #[tokio::test]
    async fn unknown_method_is_method_not_found() {
        let (session, mut rx) = test_session();
        initialize(&session, &mut rx).await;

        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":9,"method":"does.notExist"}"#)
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.error.unwrap().code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn cancel_request_aborts_the_task_with_a_cancellation_error() {
        let (session, mut rx) = test_session();
        initialize(&session, &mut rx).await;

        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":42,"method":"test.slow","params":{}}"#)
            .await;
        // Give the request task a moment to register.
        tokio::time::sleep(Duration::from_millis(50)).await;
        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":43,"method":"$/cancelRequest","params":{"id":42}}"#)
            .await;

        // Both the cancel acknowledgement and the aborted request's error
        // arrive; responses are correlated by id, not order.
        let mut by_id = std::collections::HashMap::new();
        for _ in 0..2 {
            let message = next_message(&mut rx).await;
            by_id.insert(message.id.clone().unwrap(), message);
        }

        let cancel_response = &by_id[&RequestId::Number(43)];
        assert_eq!(cancel_response.result, Some(json!({ "cancelled": true })));

        let aborted = &by_id[&RequestId::Number(42)];
        assert_eq!(
            aborted.error.as_ref().unwrap().code,
            codes::REQUEST_CANCELLED
        );

        // Nothing leaks afterwards.
        assert!(
            tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cancelling_an_unknown_id_reports_false() {
        let (session, mut rx) = test_session();
        initialize(&session, &mut rx).await;

        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":2,"method":"$/cancelRequest","params":{"id":999}}"#)
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.result, Some(json!({ "cancelled": false })));
    }

    #[tokio::test]
    async fn duplicate_request_ids_are_rejected() {
        let (session, mut rx) = test_session();
        initialize(&session, &mut rx).await;

        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":7,"method":"test.slow","params":{}}"#)
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":7,"method":"test.slow","params":{}}"#)
            .await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn close_notification_cancels_in_flight_without_leaking_responses() {
        let (session, mut rx) = test_session();
        initialize(&session, &mut rx).await;

        session
            .handle_frame(r#"{"jsonrpc":"2.0","id":11,"method":"test.slow","params":{}}"#)
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        session
            .handle_frame(r#"{"jsonrpc":"2.0","method":"$/close"}"#)
            .await;

        assert_eq!(session.state(), SessionState::Closed);
        assert!(
            tokio::time::timeout(Duration::from_millis(200), rx.recv())
                .await
                .is_err(),
            "no response may leak after close"
        );
    }

    #[tokio::test]
    async fn parse_errors_are_reported_with_null_id() {
        let (session, mut rx) = test_session();
        session.handle_frame("{not json").await;

        let response = next_message(&mut rx).await;
        assert_eq!(response.id, None);
        assert_eq!(response.error.unwrap().code, codes::PARSE_ERROR);
    }

    #[tokio::test]
    async fn notifications_before_ready_are_dropped() {
        let (session, mut rx) = test_session();
        session
            .handle_frame(r#"{"jsonrpc":"2.0","method":"some.notification"}"#)
            .await;

        assert!(
            tokio::time::timeout(Duration::from_millis(100), rx.recv())
                .await
                .is_err()
        );
        assert_eq!(session.state(), SessionState::New);
    }
}
