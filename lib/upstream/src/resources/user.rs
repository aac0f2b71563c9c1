use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::client::ApiClient;
use crate::error::UpstreamError;
use crate::resources::{unwrap_entity, unwrap_mutation};

pub const USER_SELECTION: &str = "\
id name email displayName avatarUrl active createdAt updatedAt lastSeen";

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

pub struct UserClient {
    api: Arc<ApiClient>,
}

impl UserClient {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn get(&self, id: &str) -> Result<Value, UpstreamError> {
        let document =
            format!("query GetUser($id: String!) {{ user(id: $id) {{ {USER_SELECTION} }} }}");
        let data = self.api.execute(&document, json!({ "id": id })).await?;
        unwrap_entity(data, "user", id)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Value, UpstreamError> {
        let document = format!(
            "query FindUserByEmail($email: String!) {{ users(filter: {{ email: {{ eq: $email }} }}, first: 1) {{ nodes {{ {USER_SELECTION} }} }} }}"
        );
        let data = self.api.execute(&document, json!({ "email": email })).await?;
        data.get("users")
            .and_then(|u| u.get("nodes"))
            .and_then(Value::as_array)
            .and_then(|nodes| nodes.first())
            .cloned()
            .ok_or_else(|| UpstreamError::NotFound(format!("user with email {email}")))
    }

    pub async fn list(
        &self,
        filter: Option<Value>,
        first: usize,
    ) -> Result<Vec<Value>, UpstreamError> {
        let document = format!(
            "query GetUsers($filter: UserFilter, $first: Int, $after: String) {{ users(filter: $filter, first: $first, after: $after) {{ nodes {{ {USER_SELECTION} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}"
        );
        let mut variables = Map::new();
        if let Some(filter) = filter {
            variables.insert("filter".to_string(), filter);
        }
        variables.insert("first".to_string(), json!(first));
        self.api.paginate_all(&document, variables, &["users"]).await
    }

    pub async fn update(&self, id: &str, input: UserUpdateInput) -> Result<Value, UpstreamError> {
        let document = format!(
            "mutation UpdateUser($id: String!, $input: UserUpdateInput!) {{ userUpdate(id: $id, input: $input) {{ success user {{ {USER_SELECTION} }} }} }}"
        );
        let data = self
            .api
            .execute(&document, json!({ "id": id, "input": input }))
            .await?;
        unwrap_mutation(data, "userUpdate", Some("user"))
    }
}
