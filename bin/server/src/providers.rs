//! Resource providers backed by the upstream resource clients.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use waypoint_search::ResourceType;
use waypoint_upstream::resources::{
    issue::{IssueCreateInput, IssueUpdateInput},
    IssueClient, ProjectClient, TeamClient, UserClient,
};
use waypoint_upstream::ApiClient;

use crate::error::RpcError;
use crate::registry::{ResourceOperation, ResourceProvider, ResourceProviderRegistry};

fn required_id(params: &Value) -> Result<String, RpcError> {
    params
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RpcError::invalid_params("Missing required parameter 'id'", Some("/id")))
}

fn list_args(params: &Value) -> (Option<Value>, usize) {
    let filter = params.get("filter").filter(|f| !f.is_null()).cloned();
    let first = params
        .get("first")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .unwrap_or(50);
    (filter, first)
}

fn parse_input<T: serde::de::DeserializeOwned>(params: &Value) -> Result<T, RpcError> {
    let input = params.get("input").cloned().unwrap_or(Value::Null);
    serde_json::from_value(input).map_err(|e| {
        RpcError::invalid_params(format!("Invalid input object: {e}"), Some("/input"))
    })
}

pub struct IssueProvider {
    client: IssueClient,
}

impl IssueProvider {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            client: IssueClient::new(api),
        }
    }
}

#[async_trait]
impl ResourceProvider for IssueProvider {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Issue
    }

    fn supported_operations(&self) -> Vec<ResourceOperation> {
        vec![
            ResourceOperation::List,
            ResourceOperation::Get,
            ResourceOperation::Create,
            ResourceOperation::Update,
            ResourceOperation::Delete,
        ]
    }

    async fn list(&self, params: Value) -> Result<Value, RpcError> {
        let (filter, first) = list_args(&params);
        let issues = self.client.list(filter, first).await?;
        Ok(Value::Array(issues))
    }

    async fn get(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        Ok(self.client.get(&id).await?)
    }

    async fn create(&self, params: Value) -> Result<Value, RpcError> {
        let input: IssueCreateInput = parse_input(&params)?;
        Ok(self.client.create(input).await?)
    }

    async fn update(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        let input: IssueUpdateInput = parse_input(&params)?;
        Ok(self.client.update(&id, input).await?)
    }

    async fn delete(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        self.client.delete(&id).await?;
        Ok(serde_json::json!({ "deleted": true, "id": id }))
    }
}

pub struct ProjectProvider {
    client: ProjectClient,
}

impl ProjectProvider {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            client: ProjectClient::new(api),
        }
    }
}

#[async_trait]
impl ResourceProvider for ProjectProvider {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Project
    }

    fn supported_operations(&self) -> Vec<ResourceOperation> {
        vec![ResourceOperation::List, ResourceOperation::Get]
    }

    async fn list(&self, params: Value) -> Result<Value, RpcError> {
        let (filter, first) = list_args(&params);
        let projects = self.client.list(filter, first).await?;
        Ok(Value::Array(projects))
    }

    async fn get(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        Ok(self.client.get(&id).await?)
    }
}

pub struct TeamProvider {
    client: TeamClient,
}

impl TeamProvider {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            client: TeamClient::new(api),
        }
    }
}

#[async_trait]
impl ResourceProvider for TeamProvider {
    fn resource_type(&self) -> ResourceType {
        ResourceType::Team
    }

    fn supported_operations(&self) -> Vec<ResourceOperation> {
        vec![ResourceOperation::List, ResourceOperation::Get]
    }

    async fn list(&self, params: Value) -> Result<Value, RpcError> {
        let (filter, first) = list_args(&params);
        let teams = self.client.list(filter, first).await?;
        Ok(Value::Array(teams))
    }

    async fn get(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        Ok(self.client.get(&id).await?)
    }
}

pub struct UserProvider {
    client: UserClient,
}

impl UserProvider {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            client: UserClient::new(api),
        }
    }
}

#[async_trait]
impl ResourceProvider for UserProvider {
    fn resource_type(&self) -> ResourceType {
        ResourceType::User
    }

    fn supported_operations(&self) -> Vec<ResourceOperation> {
        vec![ResourceOperation::List, ResourceOperation::Get]
    }

    async fn list(&self, params: Value) -> Result<Value, RpcError> {
        let (filter, first) = list_args(&params);
        let users = self.client.list(filter, first).await?;
        Ok(Value::Array(users))
    }

    async fn get(&self, params: Value) -> Result<Value, RpcError> {
        let id = required_id(&params)?;
        Ok(self.client.get(&id).await?)
    }
}

/// Register the default provider set against one upstream client.
pub fn default_providers(api: Arc<ApiClient>) -> ResourceProviderRegistry {
    let registry = ResourceProviderRegistry::new();
    registry.register(Arc::new(IssueProvider::new(api.clone())));
    registry.register(Arc::new(ProjectProvider::new(api.clone())));
    registry.register(Arc::new(TeamProvider::new(api.clone())));
    registry.register(Arc::new(UserProvider::new(api)));
    registry
}
