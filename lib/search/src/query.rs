use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::IntoEnumIterator;
use tracing::warn;

use crate::error::SearchError;

/// Resource type classes the search engine can query.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum ResourceType {
    Issue,
    Project,
    Team,
    User,
    Comment,
    Label,
    CustomField,
    WorkflowState,
    Cycle,
}

impl ResourceType {
    pub fn all() -> Vec<ResourceType> {
        ResourceType::iter().collect()
    }

    /// The upstream's root query field for this resource type.
    pub fn query_name(&self) -> &'static str {
        match self {
            ResourceType::Issue => "issues",
            ResourceType::Project => "projects",
            ResourceType::Team => "teams",
            ResourceType::User => "users",
            ResourceType::Comment => "comments",
            ResourceType::Label => "issueLabels",
            ResourceType::CustomField => "customFields",
            ResourceType::WorkflowState => "workflowStates",
            ResourceType::Cycle => "cycles",
        }
    }

    /// The upstream's filter input type for this resource type.
    pub fn filter_type(&self) -> &'static str {
        match self {
            ResourceType::Issue => "IssueFilter",
            ResourceType::Project => "ProjectFilter",
            ResourceType::Team => "TeamFilter",
            ResourceType::User => "UserFilter",
            ResourceType::Comment => "CommentFilter",
            ResourceType::Label => "IssueLabelFilter",
            ResourceType::CustomField => "CustomFieldFilter",
            ResourceType::WorkflowState => "WorkflowStateFilter",
            ResourceType::Cycle => "CycleFilter",
        }
    }

    /// Fixed selection set used by the search fan-out.
    pub fn selection(&self) -> &'static str {
        match self {
            ResourceType::Issue => {
                "id title description identifier url priority estimate \
                 state { id name color type } team { id name key } \
                 project { id name } assignee { id name email } \
                 labels { nodes { id name color } } \
                 createdAt updatedAt dueDate completedAt"
            }
            ResourceType::Project => {
                "id name description url state icon color startDate targetDate \
                 completedAt createdAt updatedAt team { id name key }"
            }
            ResourceType::Team => "id name key description icon color createdAt updatedAt",
            ResourceType::User => {
                "id name email displayName avatarUrl active createdAt updatedAt lastSeen"
            }
            ResourceType::Comment => {
                "id body url user { id name email } issue { id title identifier } \
                 createdAt updatedAt"
            }
            ResourceType::Label => {
                "id name description color createdAt updatedAt team { id name key }"
            }
            ResourceType::CustomField => {
                "id name description type createdAt updatedAt team { id name key }"
            }
            ResourceType::WorkflowState => {
                "id name description color type position createdAt updatedAt \
                 team { id name key }"
            }
            ResourceType::Cycle => {
                "id name description number startsAt endsAt progress createdAt updatedAt \
                 team { id name key }"
            }
        }
    }

    /// Public field name → dotted upstream path. Absent entries fail
    /// validation during filter assembly.
    pub fn field_alias(&self, field: &str) -> Option<&'static str> {
        let table: &[(&str, &str)] = match self {
            ResourceType::Issue => &[
                ("title", "title"),
                ("description", "description"),
                ("identifier", "identifier"),
                ("priority", "priority"),
                ("estimate", "estimate"),
                ("state", "state.name"),
                ("team", "team.name"),
                ("project", "project.name"),
                ("assignee", "assignee.name"),
                ("creator", "creator.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
                ("due_date", "dueDate"),
                ("completed_at", "completedAt"),
                ("label", "labels.nodes.name"),
                ("parent", "parent.title"),
            ],
            ResourceType::Project => &[
                ("name", "name"),
                ("description", "description"),
                ("state", "state"),
                ("team", "team.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
                ("start_date", "startDate"),
                ("target_date", "targetDate"),
                ("completed_at", "completedAt"),
            ],
            ResourceType::Team => &[
                ("name", "name"),
                ("key", "key"),
                ("description", "description"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
            ],
            ResourceType::User => &[
                ("name", "name"),
                ("email", "email"),
                ("display_name", "displayName"),
                ("active", "active"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
                ("last_seen", "lastSeen"),
            ],
            ResourceType::Comment => &[
                ("body", "body"),
                ("issue", "issue.title"),
                ("user", "user.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
            ],
            ResourceType::Label => &[
                ("name", "name"),
                ("description", "description"),
                ("team", "team.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
            ],
            ResourceType::CustomField => &[
                ("name", "name"),
                ("description", "description"),
                ("type", "type"),
                ("team", "team.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
            ],
            ResourceType::WorkflowState => &[
                ("name", "name"),
                ("description", "description"),
                ("team", "team.name"),
                ("type", "type"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
            ],
            ResourceType::Cycle => &[
                ("name", "name"),
                ("description", "description"),
                ("team", "team.name"),
                ("created_at", "createdAt"),
                ("updated_at", "updatedAt"),
                ("starts_at", "startsAt"),
                ("ends_at", "endsAt"),
            ],
        };
        table
            .iter()
            .find(|(public, _)| *public == field)
            .map(|(_, upstream)| *upstream)
            // Accept the upstream spelling too (`updatedAt` next to
            // `updated_at`).
            .or_else(|| {
                table
                    .iter()
                    .find(|(_, upstream)| *upstream == field)
                    .map(|(_, upstream)| *upstream)
            })
    }
}

/// Filter operators, mapped 1:1 onto the upstream's comparator keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Eq,
    Neq,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    IsNull,
}

impl Operator {
    fn comparator_key(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Neq => "neq",
            Operator::Contains => "contains",
            Operator::NotContains => "notContains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::In => "in",
            Operator::Nin => "nin",
            Operator::IsNull => "null",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// The value must match the operator's shape: `in`/`nin` take lists.
    pub fn validate(&self) -> Result<(), SearchError> {
        match self.operator {
            Operator::In | Operator::Nin if !self.value.is_array() => Err(SearchError::Validation(
                format!("Value for {:?} operator must be a list", self.operator),
            )),
            _ => Ok(()),
        }
    }

    fn comparator(&self) -> Value {
        match self.operator {
            // A truthy value asks for null, anything else for non-null.
            Operator::IsNull => {
                let wants_null = match &self.value {
                    Value::Bool(b) => *b,
                    Value::Null => false,
                    Value::String(s) => !s.is_empty() && s != "false",
                    other => other.as_f64().map(|n| n != 0.0).unwrap_or(true),
                };
                json!({ "null": wants_null })
            }
            _ => {
                let mut comparator = Map::new();
                comparator.insert(self.operator.comparator_key().to_string(), self.value.clone());
                Value::Object(comparator)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOption {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

pub const MIN_LIMIT: usize = 1;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    /// Free-text portion of the query, used for relevance scoring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub resource_types: Vec<ResourceType>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOption>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Opaque resumption cursor, passed to the upstream untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            resource_types: ResourceType::all(),
            conditions: Vec::new(),
            sort: None,
            limit: DEFAULT_LIMIT,
            cursor: None,
        }
    }
}

impl SearchQuery {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.resource_types.is_empty() {
            return Err(SearchError::Validation(
                "At least one resource type must be specified".to_string(),
            ));
        }
        if self.limit < MIN_LIMIT || self.limit > MAX_LIMIT {
            return Err(SearchError::Validation(format!(
                "Limit must be between {MIN_LIMIT} and {MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        for condition in &self.conditions {
            condition.validate()?;
            // A field no selected resource type knows is a query error; a
            // field only some types know merely narrows the fan-out.
            let known_somewhere = self
                .resource_types
                .iter()
                .any(|rt| rt.field_alias(&condition.field).is_some());
            if !known_somewhere {
                return Err(SearchError::Validation(format!(
                    "Field '{}' is not supported for any selected resource type",
                    condition.field
                )));
            }
        }
        Ok(())
    }
}

/// Parses the compact query DSL and compiles queries into upstream GraphQL
/// documents with typed filter trees.
#[derive(Debug, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Parse a compact query string.
    ///
    /// Recognized tokens (order-independent): `type:<comma-list>`,
    /// `limit:<int>`, `sort:<field>[:asc|desc]`, and `<field>:<value>` with
    /// optional `>`, `>=`, `<`, `<=`, `!` value prefixes. Whatever remains is
    /// free text and becomes a CONTAINS condition on `title` (issues) or
    /// `name` (otherwise).
    pub fn parse(&self, input: &str) -> Result<SearchQuery, SearchError> {
        let mut resource_types: Option<Vec<ResourceType>> = None;
        let mut limit = DEFAULT_LIMIT;
        let mut sort: Option<SortOption> = None;
        let mut conditions: Vec<Condition> = Vec::new();
        let mut free_text: Vec<&str> = Vec::new();

        for token in input.split_whitespace() {
            let Some((key, value)) = token.split_once(':') else {
                free_text.push(token);
                continue;
            };
            if key.is_empty() || value.is_empty() {
                free_text.push(token);
                continue;
            }

            match key {
                "type" => {
                    let mut types = Vec::new();
                    for name in value.split(',') {
                        let parsed = ResourceType::from_str(name.trim()).map_err(|_| {
                            SearchError::Validation(format!("Invalid resource type: {name}"))
                        })?;
                        if !types.contains(&parsed) {
                            types.push(parsed);
                        }
                    }
                    resource_types = Some(types);
                }
                "limit" => {
                    limit = value.parse::<usize>().map_err(|_| {
                        SearchError::Validation(format!("Invalid limit: {value}"))
                    })?;
                }
                "sort" => {
                    let (field, direction) = match value.split_once(':') {
                        Some((field, dir)) => {
                            let direction = match dir {
                                "asc" => SortDirection::Asc,
                                "desc" => SortDirection::Desc,
                                other => {
                                    return Err(SearchError::Validation(format!(
                                        "Invalid sort direction: {other}"
                                    )))
                                }
                            };
                            (field, direction)
                        }
                        None => (value, SortDirection::Asc),
                    };
                    sort = Some(SortOption {
                        field: field.to_string(),
                        direction,
                    });
                }
                field => {
                    let (operator, raw) = if let Some(rest) = value.strip_prefix(">=") {
                        (Operator::Gte, rest)
                    } else if let Some(rest) = value.strip_prefix("<=") {
                        (Operator::Lte, rest)
                    } else if let Some(rest) = value.strip_prefix('>') {
                        (Operator::Gt, rest)
                    } else if let Some(rest) = value.strip_prefix('<') {
                        (Operator::Lt, rest)
                    } else if let Some(rest) = value.strip_prefix('!') {
                        (Operator::Neq, rest)
                    } else {
                        (Operator::Eq, value)
                    };
                    conditions.push(Condition::new(
                        field,
                        operator,
                        Value::String(raw.trim().to_string()),
                    ));
                }
            }
        }

        let resource_types = resource_types.unwrap_or_else(ResourceType::all);

        // Free text stays on the query; filter compilation turns it into a
        // CONTAINS condition on each resource type's title-like field.
        let text = if free_text.is_empty() {
            None
        } else {
            Some(free_text.join(" "))
        };

        let query = SearchQuery {
            text,
            resource_types,
            conditions,
            sort,
            limit,
            cursor: None,
        };
        query.validate()?;
        Ok(query)
    }

    /// Render a query back into the DSL. Only the DSL-representable subset
    /// round-trips: scalar eq/neq/gt/gte/lt/lte conditions, the free-text
    /// condition, type/limit/sort clauses.
    pub fn to_dsl(&self, query: &SearchQuery) -> String {
        let mut parts: Vec<String> = Vec::new();

        let type_list = query
            .resource_types
            .iter()
            .map(|rt| rt.to_string())
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("type:{type_list}"));

        for condition in &query.conditions {
            let Some(value) = condition.value.as_str() else {
                continue;
            };
            let prefix = match condition.operator {
                Operator::Eq => "",
                Operator::Neq => "!",
                Operator::Gt => ">",
                Operator::Gte => ">=",
                Operator::Lt => "<",
                Operator::Lte => "<=",
                _ => continue,
            };
            parts.push(format!("{}:{}{}", condition.field, prefix, value));
        }

        if let Some(sort) = &query.sort {
            parts.push(format!("sort:{}:{}", sort.field, sort.direction.as_str()));
        }
        parts.push(format!("limit:{}", query.limit));

        if let Some(text) = &query.text {
            parts.push(text.clone());
        }

        parts.join(" ")
    }

    /// Compile a query into the upstream's filter tree for one resource
    /// type. Dotted aliases nest; `nodes` segments become collection-any
    /// (`{nodes: {some: {..}}}`) filters. Free text becomes a CONTAINS
    /// condition on the type's title-like field.
    pub fn build_filter(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
    ) -> Result<Value, SearchError> {
        let mut filter = Map::new();

        let text_condition = query.text.as_ref().map(|text| {
            Condition::new(
                text_search_field(resource_type),
                Operator::Contains,
                Value::String(text.clone()),
            )
        });

        for condition in query.conditions.iter().chain(text_condition.iter()) {
            let alias = resource_type.field_alias(&condition.field).ok_or_else(|| {
                SearchError::Validation(format!(
                    "Field '{}' is not supported for resource type '{}'",
                    condition.field, resource_type
                ))
            })?;
            condition.validate()?;

            let segments: Vec<&str> = alias.split('.').collect();
            insert_nested(&mut filter, &segments, condition.comparator());
        }

        Ok(Value::Object(filter))
    }

    /// Assemble the GraphQL search document for one resource type.
    ///
    /// Returns the document and its variables. `first` caps page size; the
    /// query's opaque cursor, when present, resumes via `after`.
    pub fn build_document(
        &self,
        resource_type: ResourceType,
        query: &SearchQuery,
        filter: Value,
        first: usize,
    ) -> (String, Value) {
        let mut arguments = format!("filter: $filter, first: {first}");

        if let Some(cursor) = &query.cursor {
            // Serialize through JSON to get correct quoting/escaping.
            arguments.push_str(&format!(", after: {}", Value::String(cursor.clone())));
        }

        if let Some(sort) = &query.sort {
            match resource_type.field_alias(&sort.field) {
                Some(upstream_field) if !upstream_field.contains('.') => {
                    arguments.push_str(&format!(
                        ", orderBy: {{ {}: {} }}",
                        upstream_field,
                        sort.direction.as_str()
                    ));
                }
                _ => {
                    warn!(
                        "Sort field '{}' not supported for resource type '{}', ignoring",
                        sort.field, resource_type
                    );
                }
            }
        }

        let document = format!(
            "query Search($filter: {filter_type}) {{ {query_name}({arguments}) {{ nodes {{ {selection} }} pageInfo {{ hasNextPage endCursor }} totalCount }} }}",
            filter_type = resource_type.filter_type(),
            query_name = resource_type.query_name(),
            selection = resource_type.selection(),
        );

        (document, json!({ "filter": filter }))
    }
}

/// The field free text searches on, per resource type.
fn text_search_field(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Issue => "title",
        ResourceType::Comment => "body",
        _ => "name",
    }
}

/// Insert a comparator at a dotted path, merging with already-present
/// branches and expanding `nodes` into `{nodes: {some: {..}}}`.
fn insert_nested(target: &mut Map<String, Value>, segments: &[&str], comparator: Value) {
    debug_assert!(!segments.is_empty());
    if segments.len() == 1 {
        target.insert(segments[0].to_string(), comparator);
        return;
    }

    let (head, rest) = (segments[0], &segments[1..]);
    let child = target
        .entry(head.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    let child_map = match child {
        Value::Object(map) => map,
        // A scalar comparator already sits here; replace it with a branch.
        other => {
            *other = Value::Object(Map::new());
            other.as_object_mut().unwrap()
        }
    };

    if head == "nodes" {
        let some = child_map
            .entry("some".to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(some_map) = some {
            insert_nested(some_map, rest, comparator);
        }
    } else {
        insert_nested(child_map, rest, comparator);
    }
}
