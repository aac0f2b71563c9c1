use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

use waypoint_search::ResourceType;

use crate::error::RpcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
    Query,
}

impl ResourceOperation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "list" => Some(Self::List),
            "get" => Some(Self::Get),
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "query" => Some(Self::Query),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Get => "get",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Query => "query",
        }
    }
}

fn unsupported(operation: ResourceOperation, resource_type: ResourceType) -> RpcError {
    RpcError::invalid_request(format!(
        "Operation '{}' is not supported for resource '{resource_type}'",
        operation.as_str()
    ))
}

/// A provider backing one resource type's operations.
///
/// Operations default to unsupported; providers override the ones they
/// advertise.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    fn resource_type(&self) -> ResourceType;
    fn supported_operations(&self) -> Vec<ResourceOperation>;

    async fn list(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::List, self.resource_type()))
    }

    async fn get(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::Get, self.resource_type()))
    }

    async fn create(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::Create, self.resource_type()))
    }

    async fn update(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::Update, self.resource_type()))
    }

    async fn delete(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::Delete, self.resource_type()))
    }

    async fn query(&self, _params: Value) -> Result<Value, RpcError> {
        Err(unsupported(ResourceOperation::Query, self.resource_type()))
    }
}

#[derive(Default)]
pub struct ResourceProviderRegistry {
    providers: DashMap<ResourceType, Arc<dyn ResourceProvider>>,
}

impl ResourceProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, provider: Arc<dyn ResourceProvider>) {
        debug!("Registered resource provider for {}", provider.resource_type());
        self.providers.insert(provider.resource_type(), provider);
    }

    pub fn get(&self, resource_type: ResourceType) -> Option<Arc<dyn ResourceProvider>> {
        self.providers
            .get(&resource_type)
            .map(|entry| entry.value().clone())
    }

    /// Dispatch an operation on a resource type. Unknown types and
    /// unregistered providers surface as not-found.
    pub async fn dispatch(
        &self,
        resource_type: ResourceType,
        operation: ResourceOperation,
        params: Value,
    ) -> Result<Value, RpcError> {
        let provider = self.get(resource_type).ok_or_else(|| {
            RpcError::not_found(format!("No provider registered for resource '{resource_type}'"))
        })?;

        if !provider.supported_operations().contains(&operation) {
            return Err(unsupported(operation, resource_type));
        }

        match operation {
            ResourceOperation::List => provider.list(params).await,
            ResourceOperation::Get => provider.get(params).await,
            ResourceOperation::Create => provider.create(params).await,
            ResourceOperation::Update => provider.update(params).await,
            ResourceOperation::Delete => provider.delete(params).await,
            ResourceOperation::Query => provider.query(params).await,
        }
    }
}
