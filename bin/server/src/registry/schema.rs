//! Structural JSON-schema validation for tool inputs and outputs.
//!
//! Covers the subset the registered schemas actually use: `type`,
//! `required`, `properties`, `items`, and `enum`. Violations report a
//! JSON-Pointer path to the offending value.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

pub fn validate(value: &Value, schema: &Value) -> Result<(), SchemaViolation> {
    validate_at(value, schema, "")
}

fn validate_at(value: &Value, schema: &Value, path: &str) -> Result<(), SchemaViolation> {
    let Some(schema_object) = schema.as_object() else {
        return Ok(());
    };

    if let Some(expected) = schema_object.get("type").and_then(Value::as_str) {
        if !type_matches(value, expected) {
            return Err(SchemaViolation {
                path: pointer(path),
                message: format!("expected {expected}, got {}", type_name(value)),
            });
        }
    }

    if let Some(allowed) = schema_object.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            return Err(SchemaViolation {
                path: pointer(path),
                message: format!("value is not one of the allowed values: {value}"),
            });
        }
    }

    if let Some(required) = schema_object.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            let missing = value.get(name).map(Value::is_null).unwrap_or(true);
            if missing {
                return Err(SchemaViolation {
                    path: pointer(&format!("{path}/{name}")),
                    message: format!("missing required property '{name}'"),
                });
            }
        }
    }

    if let (Some(properties), Some(object)) = (
        schema_object.get("properties").and_then(Value::as_object),
        value.as_object(),
    ) {
        for (name, property_schema) in properties {
            if let Some(property_value) = object.get(name) {
                validate_at(property_value, property_schema, &format!("{path}/{name}"))?;
            }
        }
    }

    if let (Some(item_schema), Some(items)) =
        (schema_object.get("items"), value.as_array())
    {
        for (index, item) in items.iter().enumerate() {
            validate_at(item, item_schema, &format!("{path}/{index}"))?;
        }
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn pointer(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn search_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "responseMode": { "type": "string", "enum": ["single", "compressed"] },
                "labels": { "type": "array", "items": { "type": "string" } },
            },
            "required": ["query"],
        })
    }

    #[test]
    fn valid_input_passes() {
        let input = json!({"query": "type:issue bug", "responseMode": "single"});
        assert!(validate(&input, &search_schema()).is_ok());
    }

    #[test]
    fn missing_required_reports_pointer_path() {
        let violation = validate(&json!({}), &search_schema()).unwrap_err();
        assert_eq!(violation.path, "/query");
    }

    #[test]
    fn wrong_type_reports_path() {
        let violation =
            validate(&json!({"query": 42}), &search_schema()).unwrap_err();
        assert_eq!(violation.path, "/query");
        assert!(violation.message.contains("expected string"));
    }

    #[test]
    fn enum_violation_is_reported() {
        let input = json!({"query": "x", "responseMode": "zipped"});
        let violation = validate(&input, &search_schema()).unwrap_err();
        assert_eq!(violation.path, "/responseMode");
    }

    #[test]
    fn array_items_are_checked() {
        let input = json!({"query": "x", "labels": ["ok", 3]});
        let violation = validate(&input, &search_schema()).unwrap_err();
        assert_eq!(violation.path, "/labels/1");
    }
}
