use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

pub const COMMENT_SELECTION: &str = "\
id body url \
user { id name email } \
issue { id title identifier } \
createdAt updatedAt";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCreateInput {
    pub issue_id: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

pub struct CommentClient {
    api: Arc<ApiClient>,
}

impl CommentClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(&self, input: CommentCreateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation CreateComment($input: CommentCreateInput!) {{ commentCreate(input: $input) {{ success comment {{ {COMMENT_SELECTION} }} }} }}"
        );
        let data = self.api.execute(&document, json!({ "input": input })).await?;
        unwrap_mutation(data, "commentCreate", Some("comment"))
    }

    pub async fn update(&self, id: &str, input: CommentUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateComment($id: String!, $input: CommentUpdateInput!) {{ commentUpdate(id: $id, input: $input) {{ success comment {{ {COMMENT_SELECTION} }} }} }}"
        );
        let data = self
            .api
            .execute(&document, json!({ "id": id, "input": input }))
            .await?;
        unwrap_mutation(data, "commentUpdate", Some("comment"))
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document = format!(
            "query GetComment($id: String!) {{ comment(id: $id) {{ {COMMENT_SELECTION} }} }}"
        );
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "comment", id)
    }

    /// All comments on an issue, oldest first as the upstream returns them.
    pub async fn for_issue(&self, issue_id: &str, first: usize) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query GetIssueComments($issueId: String!, $first: Int, $after: String) {{ issue(id: $issueId) {{ comments(first: $first, after: $after) {{ nodes {{ {COMMENT_SELECTION} }} pageInfo {{ hasNextPage endCursor }} }} }} }}"
        );
        let mut variables = Map::new();
        variables.insert("issueId".to_string(), json!(issue_id));
        variables.insert("first".to_string(), json!(first));
        self.api
            .paginate_all(&document, variables, &["issue", "comments"])
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), UpstreamError> {
        let document =
            "mutation DeleteComment($id: String!) { commentDelete(id: $id) { success } }";
        let data = self.api.execute(document, json!({ "id": id })).await?;
        unwrap_mutation(data, "commentDelete", None)?;
        Ok(())
    }
}
