use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

pub const TEAM_SELECTION: &str = "\
id name key description icon color createdAt updatedAt";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct TeamClient {
    api: Arc<ApiClient>,
}

impl TeamClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(&self, input: TeamCreateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation CreateTeam($input: TeamCreateInput!) {{ teamCreate(input: $input) {{ success team {{ {TEAM_SELECTION} }} }} }}"
        );
        let data = self.api.execute(&document, json!({ "input": input })).await?;
        unwrap_mutation(data, "teamCreate", Some("team"))
    }

    pub async fn update(&self, id: &str, input: TeamUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateTeam($id: String!, $input: TeamUpdateInput!) {{ teamUpdate(id: $id, input: $input) {{ success team {{ {TEAM_SELECTION} }} }} }}"
        );
        let data = self
            .api
            .execute(&document, json!({ "id": id, "input": input }))
            .await?;
        unwrap_mutation(data, "teamUpdate", Some("team"))
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document =
            format!("query GetTeam($id: String!) {{ team(id: $id) {{ {TEAM_SELECTION} }} }}");
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "team", id)
    }

    pub async fn list(
        &self,
        filter: Option<Value>,
        first: usize,
    ) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query GetTeams($filter: TeamFilter, $first: Int, $after: String) {{ teams(filter: $filter, first: $first, after: $after) {{ nodes {{ {TEAM_SELECTION} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}"
        );
        let mut variables = Map::new();
        if let Some(filter) = filter {
            variables.insert("filter".to_string(), filter);
        }
        variables.insert("first".to_string(), json!(first));
        self.api.paginate_all(&document, variables, &["teams"]).await
    }

    /// Team members, as a paginated connection under the team entity.
    pub async fn members(&self, id: &str, first: usize) -> Result<Vec<Value>, UpstreamError> {
        let document = "query GetTeamMembers($id: String!, $first: Int, $after: String) { team(id: $id) { members(first: $first, after: $after) { nodes { id name email displayName active } pageInfo { hasNextPage endCursor } } } }";
        let mut variables = Map::new();
        variables.insert("id".to_string(), json!(id));
        variables.insert("first".to_string(), json!(first));
        self.api
            .paginate_all(document, variables, &["team", "members"])
            .await
    }
}
