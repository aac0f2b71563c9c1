use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

/// Canonical issue selection: core fields plus the relations every consumer
/// of issue data ends up needing (state, team, project, assignee, labels).
pub const ISSUE_SELECTION: &str = "\
id title description identifier url priority estimate \
state { id name color type } \
team { id name key } \
project { id name } \
assignee { id name email } \
labels { nodes { id name color } } \
parent { id title identifier } \
createdAt updatedAt dueDate completedAt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCreateInput {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Client for issue operations.
pub struct IssueClient {
    api: Arc<ApiClient>,
}

impl IssueClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(&self, input: IssueCreateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation CreateIssue($input: IssueCreateInput!) {{ issueCreate(input: $input) {{ success issue {{ {ISSUE_SELECTION} }} }} }}"
        );
        let variables = json!({ "input": input });
        let data = self.api.execute(&document, variables).await?;
        let issue = unwrap_mutation(data, "issueCreate", Some("issue"))?;
        debug!("Created issue {}", issue["identifier"]);
        Ok(issue)
    }

    pub async fn update(&self, id: &str, input: IssueUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateIssue($id: String!, $input: IssueUpdateInput!) {{ issueUpdate(id: $id, input: $input) {{ success issue {{ {ISSUE_SELECTION} }} }} }}"
        );
        let variables = json!({ "id": id, "input": input });
        let data = self.api.execute(&document, variables).await?;
        unwrap_mutation(data, "issueUpdate", Some("issue"))
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document = format!(
            "query GetIssue($id: String!) {{ issue(id: $id) {{ {ISSUE_SELECTION} }} }}"
        );
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "issue", id)
    }

    /// List issues matching an optional filter, walking every page.
    pub async fn list(
        &self,
        filter: Option<Value>,
        first: usize,
    ) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query FindIssues($filter: IssueFilter, $first: Int, $after: String) {{ issues(filter: $filter, first: $first, after: $after) {{ nodes {{ {ISSUE_SELECTION} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}"
        );
        let mut variables = Map::new();
        if let Some(filter) = filter {
            variables.insert("filter".to_string(), filter);
        }
        variables.insert("first".to_string(), json!(first));
        self.api.paginate_all(&document, variables, &["issues"]).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), UpstreamError> {
        let document = "mutation DeleteIssue($id: String!) { issueDelete(id: $id) { success } }";
        let data = self.api.execute(document, json!({ "id": id })).await?;
        unwrap_mutation(data, "issueDelete", None)?;
        Ok(())
    }
}
