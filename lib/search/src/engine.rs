use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info};

use waypoint_config::search::{EngineConfig, SearchSectionConfig};
use waypoint_upstream::ApiClient;

use crate::cache::{CacheStats, SearchCache};
use crate::error::SearchError;
use crate::query::{QueryBuilder, ResourceType, SearchQuery, SortDirection, SortOption};
use crate::result::{SearchResponse, SearchResult, TeamRef};

/// Unified search across upstream resource types.
///
/// Fans out one GraphQL query per selected resource type in parallel, merges
/// and sorts the projected results, and keeps a response cache keyed by the
/// canonicalized query.
pub struct SearchEngine {
    api: Arc<ApiClient>,
    builder: QueryBuilder,
    options: EngineConfig,
    cache: SearchCache,
}

struct TypeOutcome {
    results: Vec<SearchResult>,
    total_count: u64,
    has_more: bool,
}

impl SearchEngine {
    pub fn new(api: Arc<ApiClient>, config: SearchSectionConfig) -> Self {
        Self {
            api,
            builder: QueryBuilder::new(),
            options: config.engine,
            cache: SearchCache::new(config.cache),
        }
    }

    pub fn query_builder(&self) -> &QueryBuilder {
        &self.builder
    }

    /// Resolve a DSL string and search.
    pub async fn search_str(&self, input: &str) -> Result<SearchResponse, SearchError> {
        let query = self.builder.parse(input)?;
        self.search(query).await
    }

    pub async fn search(&self, query: SearchQuery) -> Result<SearchResponse, SearchError> {
        query.validate()?;
        let started = Instant::now();

        if let Some(mut cached) = self.cache.get(&query) {
            info!("Cache hit for search query");
            cached.cache_hit = true;
            cached.execution_time_ms = Some(started.elapsed().as_secs_f64() * 1000.0);
            return Ok(cached);
        }

        let fan_out = join_all(
            query
                .resource_types
                .iter()
                .map(|rt| self.search_resource_type(*rt, &query)),
        );
        let outcomes = tokio::time::timeout(
            Duration::from_secs(self.options.timeout_seconds),
            fan_out,
        )
        .await
        .map_err(|_| {
            error!(
                "Search timed out after {} seconds",
                self.options.timeout_seconds
            );
            SearchError::Timeout(self.options.timeout_seconds)
        })?;

        let mut results: Vec<SearchResult> = Vec::new();
        let mut total_count: u64 = 0;
        let mut has_more = false;
        for outcome in outcomes.into_iter().flatten() {
            results.extend(outcome.results);
            total_count += outcome.total_count;
            has_more = has_more || outcome.has_more;
        }

        if let Some(sort) = &query.sort {
            sort_results(&mut results, sort);
        }

        let merged_len = results.len();
        results.truncate(query.limit);
        has_more = has_more || merged_len > query.limit;

        let response = SearchResponse {
            results,
            total_count,
            has_more,
            cursor: None,
            query: query.clone(),
            execution_time_ms: Some(started.elapsed().as_secs_f64() * 1000.0),
            cache_hit: false,
        };

        self.cache.set(&query, &response, None);

        info!(
            "Search completed with {} results in {:.2}ms",
            response.results.len(),
            response.execution_time_ms.unwrap_or(0.0)
        );
        Ok(response)
    }

    /// Query one resource type. Failures are logged and the type is skipped
    /// so a single bad fan-out leg doesn't sink the whole search.
    async fn search_resource_type(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Option<TypeOutcome> {
        match self.try_search_resource_type(resource_type, query).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                error!("Error searching {resource_type}: {err}");
                None
            }
        }
    }

    async fn try_search_resource_type(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Result<TypeOutcome, SearchError> {
        let mut filter = self.builder.build_filter(resource_type, query)?;

        if !self.options.include_archived {
            apply_archived_exclusion(resource_type, &mut filter);
        }

        let first = query.limit.min(self.options.max_results_per_type);
        let (document, variables) =
            self.builder
                .build_document(resource_type, query, filter, first);

        let data = self.api.execute(&document, variables).await?;

        let Some(connection) = data.get(resource_type.query_name()).filter(|c| !c.is_null())
        else {
            return Ok(TypeOutcome {
                results: Vec::new(),
                total_count: 0,
                has_more: false,
            });
        };

        let nodes = connection
            .get("nodes")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let has_more = connection
            .get("pageInfo")
            .and_then(|p| p.get("hasNextPage"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let total_count = connection
            .get("totalCount")
            .and_then(Value::as_u64)
            .unwrap_or(nodes.len() as u64);

        let results = nodes
            .iter()
            .filter_map(|node| self.node_to_search_result(node, resource_type))
            .collect();

        debug!("Searched {resource_type}: {total_count} total");
        Ok(TypeOutcome {
            results,
            total_count,
            has_more,
        })
    }

    /// Project an upstream node into the uniform result shape.
    fn node_to_search_result(
        &self,
        node: &Value,
        resource_type: ResourceType,
    ) -> Option<SearchResult> {
        let id = node.get("id")?.as_str()?.to_string();

        let title = match resource_type {
            ResourceType::Issue => node.get("title"),
            ResourceType::Comment => node.get("body"),
            _ => node.get("name"),
        }
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

        let description = if self.options.include_description {
            node.get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        };

        let team = node.get("team").filter(|t| !t.is_null()).map(|t| TeamRef {
            id: t.get("id").and_then(Value::as_str).map(str::to_string),
            name: t.get("name").and_then(Value::as_str).map(str::to_string),
            key: t.get("key").and_then(Value::as_str).map(str::to_string),
        });

        let mut additional_data = Map::new();
        match resource_type {
            ResourceType::Issue => {
                copy_fields(node, &mut additional_data, &["priority", "estimate"]);
                if let Some(state) = node.get("state").filter(|s| !s.is_null()) {
                    additional_data.insert("state".to_string(), state.clone());
                }
                if let Some(assignee) = node.get("assignee").filter(|a| !a.is_null()) {
                    additional_data.insert(
                        "assignee".to_string(),
                        json!({
                            "id": assignee.get("id"),
                            "name": assignee.get("name"),
                        }),
                    );
                }
                if let Some(labels) = node.get("labels").and_then(|l| l.get("nodes")) {
                    additional_data.insert("labels".to_string(), labels.clone());
                }
            }
            ResourceType::User => {
                copy_fields(node, &mut additional_data, &["email", "displayName", "active"]);
            }
            ResourceType::Project => {
                copy_fields(node, &mut additional_data, &["state", "startDate", "targetDate"]);
            }
            ResourceType::WorkflowState => {
                copy_fields(node, &mut additional_data, &["type", "color", "position"]);
            }
            ResourceType::Cycle => {
                copy_fields(node, &mut additional_data, &["number", "startsAt", "endsAt", "progress"]);
            }
            _ => {}
        }

        Some(SearchResult {
            id,
            resource_type,
            title,
            url: node.get("url").and_then(Value::as_str).map(str::to_string),
            description,
            identifier: node
                .get("identifier")
                .and_then(Value::as_str)
                .map(str::to_string),
            created_at: node
                .get("createdAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            updated_at: node
                .get("updatedAt")
                .and_then(Value::as_str)
                .map(str::to_string),
            team,
            additional_data,
            score: None,
            description_truncated: None,
        })
    }

    pub fn invalidate_cache(&self, resource_type: Option<ResourceType>) {
        self.cache.invalidate(resource_type);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn copy_fields(node: &Value, target: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        if let Some(value) = node.get(*field) {
            if !value.is_null() {
                target.insert((*field).to_string(), value.clone());
            }
        }
    }
}

/// Unless archived resources are requested, exclude them with a
/// type-specific filter clause.
fn apply_archived_exclusion(resource_type: ResourceType, filter: &mut Value) {
    if resource_type != ResourceType::Issue {
        return;
    }
    let Some(object) = filter.as_object_mut() else {
        return;
    };
    let state = object
        .entry("state".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Some(state_map) = state.as_object_mut() {
        state_map.insert("type".to_string(), json!({ "neq": "canceled" }));
    }
}

/// Sort merged results by a named field: numeric comparison when both sides
/// are numbers, string comparison otherwise. Unknown fields keep insertion
/// order (stable sort, equal keys).
fn sort_results(results: &mut [SearchResult], sort: &SortOption) {
    let keys: Vec<Value> = results
        .iter()
        .map(|result| {
            let value = serde_json::to_value(result).unwrap_or(Value::Null);
            value.get(&sort.field).cloned().unwrap_or(Value::Null)
        })
        .collect();

    let mut order: Vec<usize> = (0..results.len()).collect();
    order.sort_by(|&a, &b| {
        let ordering = compare_values(&keys[a], &keys[b]);
        match sort.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let mut reordered: Vec<SearchResult> = order
        .iter()
        .map(|&index| results[index].clone())
        .collect();
    results.swap_with_slice(&mut reordered);
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use waypoint_config::upstream::UpstreamConfig;

    fn engine_for(server_url: String) -> SearchEngine {
        let api = ApiClient::new(UpstreamConfig {
            endpoint: server_url,
            api_key: Some("test_api_key".to_string()),
            max_retries: 0,
            retry_delay_ms: 1,
            ..UpstreamConfig::default()
        })
        .unwrap();
        SearchEngine::new(Arc::new(api), SearchSectionConfig::default())
    }

    fn body_contains(request: &mockito::Request, needle: &str) -> bool {
        let body = request.body().expect("Failed to extract body");
        String::from_utf8_lossy(body).contains(needle)
    }

    fn issue_connection_body() -> &'static str {
        r##"{"data":{"issues":{"nodes":[{"id":"i1","title":"Broken search","identifier":"ENG-1","url":"https://tracker.example/ENG-1","priority":2,"state":{"id":"s1","name":"Todo","color":"#ccc","type":"unstarted"},"team":{"id":"t1","name":"Core","key":"COR"},"createdAt":"2026-07-01T00:00:00.000Z","updatedAt":"2026-07-20T00:00:00.000Z"}],"pageInfo":{"hasNextPage":false,"endCursor":null},"totalCount":1}}}"##
    }

    fn project_connection_body() -> &'static str {
        r#"{"data":{"projects":{"nodes":[{"id":"p1","name":"Search revamp","state":"started","team":{"id":"t1","name":"Core","key":"COR"},"createdAt":"2026-06-01T00:00:00.000Z","updatedAt":"2026-07-10T00:00:00.000Z"}],"pageInfo":{"hasNextPage":false,"endCursor":null},"totalCount":1}}}"#
    }

    #[tokio::test]
    async fn fan_out_merges_resource_types() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "issues(filter"))
            .with_body(issue_connection_body())
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "projects(filter"))
            .with_body(project_connection_body())
            .create_async()
            .await;

        let engine = engine_for(server.url());
        let response = engine
            .search_str("type:issue,project limit:10 search")
            .await
            .unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.total_count, 2);
        assert!(!response.cache_hit);
        assert!(response.execution_time_ms.unwrap() > 0.0);

        let types: Vec<ResourceType> =
            response.results.iter().map(|r| r.resource_type).collect();
        assert!(types.contains(&ResourceType::Issue));
        assert!(types.contains(&ResourceType::Project));
    }

    #[tokio::test]
    async fn second_search_hits_the_cache_with_identical_results() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "issues(filter"))
            .with_body(issue_connection_body())
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(server.url());
        let first = engine
            .search_str("type:issue limit:10 search functionality")
            .await
            .unwrap();
        let second = engine
            .search_str("type:issue limit:10 search functionality")
            .await
            .unwrap();

        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.results, second.results);
    }

    #[tokio::test]
    async fn archived_issues_are_excluded_by_default() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, r#""state":{"type":{"neq":"canceled"}}"#))
            .with_body(issue_connection_body())
            .expect(1)
            .create_async()
            .await;

        let engine = engine_for(server.url());
        engine.search_str("type:issue anything").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn failing_resource_type_is_skipped() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "issues(filter"))
            .with_status(500)
            .with_body("{}")
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "projects(filter"))
            .with_body(project_connection_body())
            .create_async()
            .await;

        let engine = engine_for(server.url());
        let response = engine
            .search_str("type:issue,project limit:10 revamp")
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].resource_type, ResourceType::Project);
    }

    #[tokio::test]
    async fn merged_results_truncate_to_limit_and_flag_more() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(
                r#"{"data":{"issues":{"nodes":[{"id":"i1","title":"a"},{"id":"i2","title":"b"},{"id":"i3","title":"c"}],"pageInfo":{"hasNextPage":false,"endCursor":null},"totalCount":3}}}"#,
            )
            .create_async()
            .await;

        let engine = engine_for(server.url());
        let response = engine.search_str("type:issue limit:2 x").await.unwrap();

        assert_eq!(response.results.len(), 2);
        assert!(response.has_more);
        assert_eq!(response.total_count, 3);
    }

    #[tokio::test]
    async fn cache_invalidation_by_type_forces_requery() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_request(|r| body_contains(r, "issues(filter"))
            .with_body(issue_connection_body())
            .expect(2)
            .create_async()
            .await;

        let engine = engine_for(server.url());
        engine.search_str("type:issue limit:10 again").await.unwrap();
        engine.invalidate_cache(Some(ResourceType::Issue));
        let response = engine.search_str("type:issue limit:10 again").await.unwrap();

        assert!(!response.cache_hit);
        mock.assert_async().await;
    }

    #[test]
    fn sort_compares_strings_and_numbers() {
        fn result_with(id: &str, updated_at: &str) -> SearchResult {
            SearchResult {
                id: id.to_string(),
                resource_type: ResourceType::Issue,
                title: id.to_string(),
                url: None,
                description: None,
                identifier: None,
                created_at: None,
                updated_at: Some(updated_at.to_string()),
                team: None,
                additional_data: Map::new(),
                score: None,
                description_truncated: None,
            }
        }

        let mut results = vec![
            result_with("older", "2026-01-01T00:00:00Z"),
            result_with("newer", "2026-07-01T00:00:00Z"),
        ];
        sort_results(
            &mut results,
            &SortOption {
                field: "updatedAt".to_string(),
                direction: SortDirection::Desc,
            },
        );
        assert_eq!(results[0].id, "newer");

        // Unknown field keeps insertion order.
        let mut results = vec![result_with("first", "x"), result_with("second", "y")];
        sort_results(
            &mut results,
            &SortOption {
                field: "nonexistent".to_string(),
                direction: SortDirection::Asc,
            },
        );
        assert_eq!(results[0].id, "first");
    }
}
