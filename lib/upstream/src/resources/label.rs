use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

pub const LABEL_SELECTION: &str = "\
id name description color createdAt updatedAt \
team { id name key }";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelCreateInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

pub struct LabelClient {
    api: Arc<ApiClient>,
}

impl LabelClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn create(&self, input: LabelCreateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation CreateLabel($input: IssueLabelCreateInput!) {{ issueLabelCreate(input: $input) {{ success issueLabel {{ {LABEL_SELECTION} }} }} }}"
        );
        let data = self.api.execute(&document, json!({ "input": input })).await?;
        unwrap_mutation(data, "issueLabelCreate", Some("issueLabel"))
    }

    pub async fn update(&self, id: &str, input: LabelUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateLabel($id: String!, $input: IssueLabelUpdateInput!) {{ issueLabelUpdate(id: $id, input: $input) {{ success issueLabel {{ {LABEL_SELECTION} }} }} }}"
        );
        let data = self
            .api
            .execute(&document, json!({ "id": id, "input": input }))
            .await?;
        unwrap_mutation(data, "issueLabelUpdate", Some("issueLabel"))
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document = format!(
            "query GetLabel($id: String!) {{ issueLabel(id: $id) {{ {LABEL_SELECTION} }} }}"
        );
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "issueLabel", id)
    }

    pub async fn list(
        &self,
        filter: Option<Value>,
        first: usize,
    ) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query GetLabels($filter: IssueLabelFilter, $first: Int, $after: String) {{ issueLabels(filter: $filter, first: $first, after: $after) {{ nodes {{ {LABEL_SELECTION} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}"
        );
        let mut variables = Map::new();
        if let Some(filter) = filter {
            variables.insert("filter".to_string(), filter);
        }
        variables.insert("first".to_string(), json!(first));
        self.api
            .paginate_all(&document, variables, &["issueLabels"])
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), UpstreamError> {
        let document =
            "mutation DeleteLabel($id: String!) { issueLabelDelete(id: $id) { success } }";
        let data = self.api.execute(document, json!({ "id": id })).await?;
        unwrap_mutation(data, "issueLabelDelete", None)?;
        Ok(())
    }
}
