use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::RpcError;
use crate::registry::schema;

#[derive(Debug, Clone)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub version: Option<String>,
}

/// A tool exposed to clients by name.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn execute(&self, params: Value) -> Result<Value, RpcError>;
}

#[derive(Default)]
pub struct ToolProviderRegistry {
    providers: DashMap<String, Arc<dyn ToolProvider>>,
}

impl ToolProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn ToolProvider>) {
        let name = provider.metadata().name;
        debug!("Registered tool provider for {name}");
        self.providers.insert(name, provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolProvider>> {
        self.providers
            .get(name)
            .map(|entry| entry.value().clone())
    }

    pub fn has(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Execute a tool, validating input and output against its registered
    /// schemas when present.
    pub async fn execute(&self, name: &str, params: Value) -> Result<Value, RpcError> {
        let provider = self
            .get(name)
            .ok_or_else(|| RpcError::not_found(format!("Tool not available: {name}")))?;
        let metadata = provider.metadata();

        if let Some(input_schema) = &metadata.input_schema {
            schema::validate(&params, input_schema).map_err(|violation| {
                RpcError::invalid_params(
                    format!("Invalid input for tool {name}: {}", violation.message),
                    Some(&violation.path),
                )
            })?;
        }

        let result = provider.execute(params).await?;

        if let Some(output_schema) = &metadata.output_schema {
            if let Err(violation) = schema::validate(&result, output_schema) {
                warn!(
                    "Tool {name} produced output violating its schema at {}: {}",
                    violation.path, violation.message
                );
                return Err(RpcError::internal(format!(
                    "Tool {name} produced an invalid result"
                )));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    struct EchoTool;

    #[async_trait]
    impl ToolProvider for EchoTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "echo".to_string(),
                description: "Echoes its input".to_string(),
                input_schema: Some(json!({
                    "type": "object",
                    "properties": { "value": { "type": "string" } },
                    "required": ["value"],
                })),
                output_schema: Some(json!({
                    "type": "object",
                    "properties": { "value": { "type": "string" } },
                    "required": ["value"],
                })),
                version: None,
            }
        }

        async fn execute(&self, params: Value) -> Result<Value, RpcError> {
            Ok(params)
        }
    }

    #[tokio::test]
    async fn executes_with_valid_input() {
        let registry = ToolProviderRegistry::new();
        registry.register(Arc::new(EchoTool));

        let result = registry
            .execute("echo", json!({"value": "hi"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"value": "hi"}));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_with_path() {
        let registry = ToolProviderRegistry::new();
        registry.register(Arc::new(EchoTool));

        let err = registry.execute("echo", json!({})).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_PARAMS);
        assert_eq!(err.data, Some(json!({"path": "/value"})));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolProviderRegistry::new();
        let err = registry.execute("missing", json!({})).await.unwrap_err();
        assert_eq!(err.code, codes::NOT_FOUND);
    }
}
