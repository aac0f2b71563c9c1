use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::NAMESPACE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapabilityType {
    Resource,
    Tool,
    Feature,
}

/// A named contract the server advertises: a resource with its supported
/// operations, a tool with its schemas, or a feature with settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capability {
    pub name: String,
    #[serde(rename = "type")]
    pub capability_type: CapabilityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional semantic version of the contract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl Capability {
    pub fn resource(name: impl Into<String>, description: &str, operations: &[&str]) -> Self {
        Self {
            name: name.into(),
            capability_type: CapabilityType::Resource,
            description: Some(description.to_string()),
            version: None,
            operations: Some(operations.iter().map(|op| op.to_string()).collect()),
            input_schema: None,
            output_schema: None,
            settings: None,
        }
    }

    pub fn tool(
        name: impl Into<String>,
        description: &str,
        input_schema: Value,
        output_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            capability_type: CapabilityType::Tool,
            description: Some(description.to_string()),
            version: None,
            operations: None,
            input_schema: Some(input_schema),
            output_schema: Some(output_schema),
            settings: None,
        }
    }

    pub fn feature(name: impl Into<String>, description: &str, settings: Value) -> Self {
        Self {
            name: name.into(),
            capability_type: CapabilityType::Feature,
            description: Some(description.to_string()),
            version: None,
            operations: None,
            input_schema: None,
            output_schema: None,
            settings: Some(settings),
        }
    }

    pub fn supports_operation(&self, operation: &str) -> bool {
        self.operations
            .as_ref()
            .map(|ops| ops.iter().any(|op| op == operation))
            .unwrap_or(false)
    }
}

/// Registry of the server's advertised capabilities.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Capability>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Capability) {
        debug!(
            "Registered capability: {} ({:?})",
            capability.name, capability.capability_type
        );
        self.capabilities.insert(capability.name.clone(), capability);
    }

    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    pub fn by_type(&self, capability_type: CapabilityType) -> Vec<&Capability> {
        self.capabilities
            .values()
            .filter(|c| c.capability_type == capability_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Wire representation: name → capability object.
    pub fn to_map(&self) -> Map<String, Value> {
        self.capabilities
            .iter()
            .map(|(name, capability)| {
                (
                    name.clone(),
                    serde_json::to_value(capability).unwrap_or(Value::Null),
                )
            })
            .collect()
    }

    /// Negotiate against the client's advertised capability map: a server
    /// capability is included when the client names it and, if the client
    /// states a type, the types agree. Every capability is optional.
    pub fn negotiate(&self, client_capabilities: &Map<String, Value>) -> Map<String, Value> {
        let mut negotiated = Map::new();

        for (name, capability) in &self.capabilities {
            let Some(client_capability) = client_capabilities.get(name) else {
                continue;
            };
            if let Some(client_type) = client_capability.get("type").and_then(Value::as_str) {
                let server_type = serde_json::to_value(capability.capability_type)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                if client_type != server_type {
                    warn!(
                        "Capability type mismatch for {name}: server={server_type}, client={client_type}"
                    );
                    continue;
                }
            }
            negotiated.insert(
                name.clone(),
                serde_json::to_value(capability).unwrap_or(Value::Null),
            );
        }

        info!(
            "Negotiated {} of {} server capabilities against {} client capabilities",
            negotiated.len(),
            self.capabilities.len(),
            client_capabilities.len()
        );
        negotiated
    }
}

/// The default capability set registered at startup.
pub fn default_capabilities() -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();

    registry.register(Capability::resource(
        format!("{NAMESPACE}.issue"),
        "Issue resource",
        &["list", "get", "create", "update", "delete"],
    ));
    registry.register(Capability::resource(
        format!("{NAMESPACE}.project"),
        "Project resource",
        &["list", "get"],
    ));
    registry.register(Capability::resource(
        format!("{NAMESPACE}.team"),
        "Team resource",
        &["list", "get"],
    ));
    registry.register(Capability::resource(
        format!("{NAMESPACE}.user"),
        "User resource",
        &["list", "get"],
    ));

    registry.register(Capability::tool(
        format!("{NAMESPACE}.convertFeatureList"),
        "Convert a feature list into issues",
        json!({
            "type": "object",
            "properties": {
                "text": { "type": "string" },
                "format": { "type": "string", "enum": ["text", "markdown", "json"] },
                "teamId": { "type": "string" },
                "projectId": { "type": "string" },
                "labels": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["text"],
        }),
        json!({
            "type": "object",
            "properties": {
                "issues": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "url": { "type": "string" },
                        },
                    },
                },
            },
        }),
    ));

    registry.register(Capability::tool(
        format!("{NAMESPACE}.search"),
        "Unified search across resource types",
        json!({
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
            "required": ["query"],
        }),
        json!({ "type": "object" }),
    ));

    registry.register(Capability::feature(
        "textDocument",
        "Text document synchronization",
        json!({}),
    ));

    registry
}
