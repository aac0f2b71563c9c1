use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use waypoint_config::search::SearchSectionConfig;
use waypoint_search::{ResponseMode, ResponseShaper, ResultFormatter, SearchEngine, SearchOptimizer};

use crate::error::RpcError;
use crate::registry::{ToolMetadata, ToolProvider};
use crate::NAMESPACE;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SearchToolParams {
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_true")]
    optimize: bool,
    #[serde(default = "default_true")]
    format: bool,
    #[serde(default)]
    response_mode: ResponseMode,
    /// Return cache statistics instead of searching.
    #[serde(default)]
    stats: bool,
}

fn default_true() -> bool {
    true
}

/// The `tracker.search` tool: unified search with optimization, formatting,
/// and caller-selected response shaping.
pub struct SearchTool {
    engine: Arc<SearchEngine>,
    optimizer: SearchOptimizer,
    formatter: ResultFormatter,
    shaper: ResponseShaper,
}

impl SearchTool {
    pub fn new(engine: Arc<SearchEngine>, config: &SearchSectionConfig) -> Self {
        Self {
            engine,
            optimizer: SearchOptimizer::new(config.optimizer.clone()),
            formatter: ResultFormatter::new(config.formatting.clone()),
            shaper: ResponseShaper::new(config.shaping.clone()),
        }
    }
}

#[async_trait]
impl ToolProvider for SearchTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: format!("{NAMESPACE}.search"),
            description: "Unified search across resource types".to_string(),
            input_schema: Some(json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "optimize": { "type": "boolean" },
                    "format": { "type": "boolean" },
                    "responseMode": {
                        "type": "string",
                        "enum": ["single", "compressed", "batched", "streamed"],
                    },
                    "stats": { "type": "boolean" },
                },
            })),
            output_schema: Some(json!({ "type": "object" })),
            version: None,
        }
    }

    async fn execute(&self, params: Value) -> Result<Value, RpcError> {
        let params: SearchToolParams = serde_json::from_value(params)
            .map_err(|e| RpcError::invalid_params(format!("Invalid search parameters: {e}"), None))?;

        if params.stats {
            let stats = serde_json::to_value(self.engine.cache_stats())
                .map_err(|e| RpcError::internal(e.to_string()))?;
            return Ok(json!({ "cacheStats": stats }));
        }

        let query = params.query.as_deref().ok_or_else(|| {
            RpcError::invalid_params("Missing required parameter 'query'", Some("/query"))
        })?;

        let mut response = self.engine.search_str(query).await?;

        // Cache hits are returned as stored; only fresh responses pass
        // through the optimizer.
        if params.optimize && !response.cache_hit {
            response = self.optimizer.optimize(response);
        }

        let document = if params.format {
            self.formatter.format_response(&response)
        } else {
            serde_json::to_value(&response).map_err(|e| RpcError::internal(e.to_string()))?
        };

        debug!(
            "Search tool returning {} results in {:?} mode",
            response.results.len(),
            params.response_mode
        );

        match params.response_mode {
            ResponseMode::Batched => Ok(json!({
                "batches": self.shaper.batches(&document, &response),
            })),
            ResponseMode::Streamed => Ok(json!({
                "chunks": self.shaper.stream_chunks(&document, &response),
            })),
            mode => Ok(self.shaper.shape(document, &response, mode)?),
        }
    }
}
