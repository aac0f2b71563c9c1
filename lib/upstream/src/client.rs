use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use waypoint_config::upstream::{AuthType, UpstreamConfig};

use crate::error::UpstreamError;
use crate::rate_limit::{now_unix, BudgetDecision, RateLimitState};

/// Client for the upstream GraphQL API.
///
/// Executes GraphQL documents over HTTPS with the configured credential,
/// bounds in-flight requests with a fair semaphore, tracks the upstream's
/// rate budget, and retries transport-class failures with full-jitter
/// exponential backoff.
pub struct ApiClient {
    config: UpstreamConfig,
    http: reqwest::Client,
    semaphore: Arc<Semaphore>,
    rate_limit: Mutex<RateLimitState>,
}

impl ApiClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        config.validate().map_err(UpstreamError::Transport)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let semaphore = Arc::new(Semaphore::new(config.concurrent_requests));
        let rate_limit = Mutex::new(RateLimitState::new(config.rate_limit_per_hour));

        debug!("Upstream client initialized with auth type {:?}", config.auth_type);

        Ok(Self {
            config,
            http,
            semaphore,
            rate_limit,
        })
    }

    fn headers(&self) -> Result<HeaderMap, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = match self.config.auth_type {
            AuthType::ApiKey => self.config.api_key.clone().unwrap_or_default(),
            AuthType::Oauth => {
                format!("Bearer {}", self.config.oauth_token.clone().unwrap_or_default())
            }
        };
        let auth_value = HeaderValue::from_str(&auth_value)
            .map_err(|e| UpstreamError::Transport(format!("invalid credential: {e}")))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    /// Snapshot of the current rate-limit accounting.
    pub fn rate_limit(&self) -> RateLimitState {
        self.rate_limit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn pin_rate_limit(&self, remaining: u32, reset_at: u64) {
        let mut state = self
            .rate_limit
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.remaining = remaining;
        state.reset_at = reset_at;
    }

    /// Execute a GraphQL document with variables, returning the `data` field.
    ///
    /// Retries transport faults and 5xx responses up to `max_retries` with a
    /// delay sampled uniformly in `[0, retry_delay * 2^attempt]`. Auth
    /// failures, missing resources, timeouts, and GraphQL-level errors
    /// surface immediately.
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, UpstreamError> {
        let mut attempt: u32 = 0;
        loop {
            match self.execute_once(query, &variables).await {
                Ok(data) => return Ok(data),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "Upstream request failed (attempt {}): {}. Retrying in {:?}",
                        attempt + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let cap = self
            .config
            .retry_delay_ms
            .saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(rand::rng().random_range(0..=cap))
    }

    async fn execute_once(&self, query: &str, variables: &Value) -> Result<Value, UpstreamError> {
        self.check_rate_budget().await?;

        // This unwrap is safe because the semaphore is never closed during
        // the client's lifecycle, so `acquire()` always returns `Ok`.
        let _permit = self.semaphore.acquire().await.unwrap();

        let payload = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .headers(self.headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("Timeout making upstream API request");
                    UpstreamError::Timeout
                } else {
                    UpstreamError::Transport(e.to_string())
                }
            })?;

        {
            let mut state = self
                .rate_limit
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.record_response(response.headers());
        }

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            error!("Unauthorized request to upstream API");
            return Err(UpstreamError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound("upstream endpoint".to_string()));
        }

        let body: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else if status.is_success() {
                UpstreamError::Shape(format!("response body is not JSON: {e}"))
            } else {
                UpstreamError::Api {
                    status: status.as_u16(),
                    message: "non-JSON error body".to_string(),
                }
            }
        })?;

        if let Some(errors) = body.get("errors").and_then(Value::as_array) {
            let joined = errors
                .iter()
                .map(|e| {
                    e.get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string()
                })
                .collect::<Vec<_>>()
                .join("; ");
            error!("Upstream API errors: {}", joined);
            return Err(UpstreamError::Graphql(joined));
        }

        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("upstream request failed")
                    .to_string(),
            });
        }

        body.get("data")
            .cloned()
            .ok_or_else(|| UpstreamError::Shape("missing data field".to_string()))
    }

    /// Gate on the local rate budget: sleep through short resets, fail fast
    /// on long ones.
    async fn check_rate_budget(&self) -> Result<(), UpstreamError> {
        loop {
            let decision = {
                let mut state = self
                    .rate_limit
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                state.before_send(now_unix())
            };
            match decision {
                BudgetDecision::Proceed => return Ok(()),
                BudgetDecision::SleepFor(delay) => tokio::time::sleep(delay).await,
                BudgetDecision::Exhausted { reset_in_seconds } => {
                    return Err(UpstreamError::RateLimited { reset_in_seconds })
                }
            }
        }
    }

    /// Start a lazy pagination over a connection field.
    ///
    /// `path` addresses the connection object inside `data` (for example
    /// `["team", "issues"]`). The caller drives pages one at a time and may
    /// stop early; nothing is prefetched.
    pub fn paginate<'a>(
        &'a self,
        query: &str,
        variables: Map<String, Value>,
        path: &[&str],
    ) -> Paginator<'a> {
        Paginator {
            client: self,
            query: query.to_string(),
            variables,
            path: path.iter().map(|s| s.to_string()).collect(),
            cursor: None,
            exhausted: false,
        }
    }

    /// Iterate a connection to exhaustion, accumulating all nodes.
    pub async fn paginate_all(
        &self,
        query: &str,
        variables: Map<String, Value>,
        path: &[&str],
    ) -> Result<Vec<Value>, UpstreamError> {
        let mut paginator = self.paginate(query, variables, path);
        let mut nodes = Vec::new();
        while let Some(page) = paginator.next_page().await? {
            nodes.extend(page.nodes);
        }
        Ok(nodes)
    }
}

/// One page of a cursor-paginated connection.
#[derive(Debug, Clone)]
pub struct Page {
    pub nodes: Vec<Value>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    pub total_count: Option<u64>,
}

/// Lazy, restartable cursor pagination over `(cursor, batch)` pairs.
pub struct Paginator<'a> {
    client: &'a ApiClient,
    query: String,
    variables: Map<String, Value>,
    path: Vec<String>,
    cursor: Option<String>,
    exhausted: bool,
}

impl Paginator<'_> {
    /// Fetch the next page, or `None` once `pageInfo.hasNextPage` was false.
    pub async fn next_page(&mut self) -> Result<Option<Page>, UpstreamError> {
        if self.exhausted {
            return Ok(None);
        }

        let mut variables = self.variables.clone();
        if let Some(cursor) = &self.cursor {
            variables.insert("after".to_string(), Value::String(cursor.clone()));
        }

        let data = self
            .client
            .execute(&self.query, Value::Object(variables))
            .await?;

        let mut connection = &data;
        for segment in &self.path {
            connection = connection.get(segment).ok_or_else(|| {
                UpstreamError::Shape(format!("path segment '{segment}' not found in response"))
            })?;
        }

        let nodes = connection
            .get("nodes")
            .and_then(Value::as_array)
            .cloned()
            .ok_or_else(|| UpstreamError::Shape("connection has no nodes".to_string()))?;

        let page_info = connection.get("pageInfo");
        let has_next_page = page_info
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let end_cursor = page_info
            .and_then(|p| p.get("endCursor"))
            .and_then(Value::as_str)
            .map(str::to_string);
        let total_count = connection.get("totalCount").and_then(Value::as_u64);

        self.cursor = end_cursor.clone();
        if !has_next_page || self.cursor.is_none() {
            self.exhausted = true;
        }

        Ok(Some(Page {
            nodes,
            end_cursor,
            has_next_page,
            total_count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_config(endpoint: String) -> UpstreamConfig {
        UpstreamConfig {
            endpoint,
            api_key: Some("test_api_key".to_string()),
            retry_delay_ms: 1,
            ..UpstreamConfig::default()
        }
    }

    #[tokio::test]
    async fn execute_returns_data_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", "test_api_key")
            .with_status(200)
            .with_body(r#"{"data":{"viewer":{"id":"u1"}}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        let data = client
            .execute("query { viewer { id } }", serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(data["viewer"]["id"], "u1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn http_401_maps_to_unauthorized_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(401)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        let err = client.execute("query { viewer { id } }", serde_json::json!({})).await;

        assert!(matches!(err, Err(UpstreamError::Unauthorized)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn graphql_errors_are_joined_and_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(r#"{"errors":[{"message":"first"},{"message":"second"}]}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        let err = client
            .execute("query { viewer { id } }", serde_json::json!({}))
            .await
            .unwrap_err();

        match err {
            UpstreamError::Graphql(message) => assert_eq!(message, "first; second"),
            other => panic!("expected Graphql error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_are_retried_up_to_the_cap() {
        let mut server = mockito::Server::new_async().await;
        // max_retries = 3 means one initial attempt plus three retries.
        let mock = server
            .mock("POST", "/")
            .with_status(502)
            .with_body("{}")
            .expect(4)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        let err = client
            .execute("query { ok }", serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::Api { status: 502, .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_budget_with_long_reset_fails_without_sending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .expect(0)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        client.pin_rate_limit(0, now_unix() + 120);

        let err = client
            .execute("query { viewer { id } }", serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, UpstreamError::RateLimited { .. }));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn response_headers_update_rate_limit_state() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_header("X-RateLimit-Remaining", "17")
            .with_header("X-RateLimit-Reset", "1900000000")
            .with_body(r#"{"data":{}}"#)
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        client.execute("query { ok }", serde_json::json!({})).await.unwrap();

        let state = client.rate_limit();
        assert_eq!(state.remaining, 17);
        assert_eq!(state.reset_at, 1_900_000_000);
    }

    #[tokio::test]
    async fn paginator_walks_cursors_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_request(|request| {
                let body = request.body().expect("Failed to extract body");
                !String::from_utf8_lossy(body).contains("after")
            })
            .with_status(200)
            .with_body(
                r#"{"data":{"issues":{"nodes":[{"id":"i1"}],"pageInfo":{"hasNextPage":true,"endCursor":"c1"},"totalCount":2}}}"#,
            )
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_request(|request| {
                let body = request.body().expect("Failed to extract body");
                String::from_utf8_lossy(body).contains(r#""after":"c1""#)
            })
            .with_status(200)
            .with_body(
                r#"{"data":{"issues":{"nodes":[{"id":"i2"}],"pageInfo":{"hasNextPage":false,"endCursor":null},"totalCount":2}}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(test_config(server.url())).unwrap();
        let nodes = client
            .paginate_all("query { issues { nodes { id } } }", Map::new(), &["issues"])
            .await
            .unwrap();

        let ids: Vec<_> = nodes.iter().map(|n| n["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["i1", "i2"]);
    }
}
