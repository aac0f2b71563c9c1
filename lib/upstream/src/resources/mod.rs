pub mod comment;
pub mod issue;
pub mod label;
pub mod project;
pub mod team;
pub mod user;

pub use comment::CommentClient;
pub use issue::IssueClient;
pub use label::LabelClient;
pub use project::ProjectClient;
pub use team::TeamClient;
pub use user::UserClient;

use serde_json::Value;

use crate::error::UpstreamError;

/// Unwrap a mutation payload: `success` must be true, and the named entity
/// field (when requested) is returned.
pub(crate) fn unwrap_mutation(
    data: Value,
    payload_field: &str,
    entity_field: Option<&str>,
) -> Result<Value, UpstreamError> {
    let payload = data.get(payload_field).cloned().ok_or_else(|| {
        UpstreamError::Shape(format!("missing '{payload_field}' in mutation response"))
    })?;

    let success = payload
        .get("success")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if !success {
        return Err(UpstreamError::MutationFailed(payload_field.to_string()));
    }

    match entity_field {
        Some(field) => payload.get(field).cloned().ok_or_else(|| {
            UpstreamError::Shape(format!("missing '{field}' in '{payload_field}' payload"))
        }),
        None => Ok(Value::Null),
    }
}

/// Unwrap a get-by-id response: a null entity means the resource is absent.
pub(crate) fn unwrap_entity(
    data: Value,
    field: &str,
    id: &str,
) -> Result<Value, UpstreamError> {
    match data.get(field) {
        Some(Value::Null) | None => Err(UpstreamError::NotFound(format!("{field} {id}"))),
        Some(entity) => Ok(entity.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unsuccessful_mutation_is_an_error() {
        let data = json!({"issueCreate": {"success": false, "issue": null}});
        let err = unwrap_mutation(data, "issueCreate", Some("issue")).unwrap_err();
        assert!(matches!(err, UpstreamError::MutationFailed(field) if field == "issueCreate"));
    }

    #[test]
    fn successful_mutation_returns_entity() {
        let data = json!({"issueCreate": {"success": true, "issue": {"id": "i1"}}});
        let issue = unwrap_mutation(data, "issueCreate", Some("issue")).unwrap();
        assert_eq!(issue["id"], "i1");
    }

    #[test]
    fn null_entity_is_not_found() {
        let data = json!({"issue": null});
        let err = unwrap_entity(data, "issue", "missing-id").unwrap_err();
        assert!(matches!(err, UpstreamError::NotFound(_)));
    }
}
