use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

pub const PROJECT_SELECTION: &str = "\
id name description url state icon color \
startDate targetDate completedAt createdAt updatedAt \
team { id name key }";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
}

pub struct ProjectClient {
    api: Arc<ApiClient>,
}

impl ProjectClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(&self, input: ProjectCreateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation CreateProject($input: ProjectCreateInput!) {{ projectCreate(input: $input) {{ success project {{ {PROJECT_SELECTION} }} }} }}"
        );
        let data = self.api.execute(&document, json!({ "input": input })).await?;
        unwrap_mutation(data, "projectCreate", Some("project"))
    }

    pub async fn update(&self, id: &str, input: ProjectUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateProject($id: String!, $input: ProjectUpdateInput!) {{ projectUpdate(id: $id, input: $input) {{ success project {{ {PROJECT_SELECTION} }} }} }}"
        );
        let data = self
            .api
            .execute(&document, json!({ "id": id, "input": input }))
            .await?;
        unwrap_mutation(data, "projectUpdate", Some("project"))
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document = format!(
            "query GetProject($id: String!) {{ project(id: $id) {{ {PROJECT_SELECTION} }} }}"
        );
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "project", id)
    }

    pub async fn list(
        &self,
        filter: Option<Value>,
        first: usize,
    ) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query GetProjects($filter: ProjectFilter, $first: Int, $after: String) {{ projects(filter: $filter, first: $first, after: $after) {{ nodes {{ {PROJECT_SELECTION} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}"
        );
        let mut variables = Map::new();
        if let Some(filter) = filter {
            variables.insert("filter".to_string(), filter);
        }
        variables.insert("first".to_string(), json!(first));
        self.api.paginate_all(&document, variables, &["projects"]).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), UpstreamError> {
        let document =
            "mutation DeleteProject($id: String!) { projectDelete(id: $id) { success } }";
        let data = self.api.execute(document, json!({ "id": id })).await?;
        unwrap_mutation(data, "projectDelete", None)?;
        Ok(())
    }
}
