use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use waypoint_config::search::{FormattingConfig, HighlightConfig};

use crate::optimizer::{extract_terms, sentence_cutoff};
use crate::result::SearchResponse;

/// Presentation-layer formatter for search responses: term highlighting with
/// context fragments, grouping, date companions, and optional summaries.
///
/// Scores are presented as-is; the optimizer owns them.
pub struct ResultFormatter {
    options: FormattingConfig,
}

impl ResultFormatter {
    pub fn new(options: FormattingConfig) -> Self {
        Self { options }
    }

    /// Produce the wire-shaped response document.
    pub fn format_response(&self, response: &SearchResponse) -> Value {
        let mut document = serde_json::to_value(response).unwrap_or(Value::Null);

        let terms = response
            .query
            .text
            .as_deref()
            .map(extract_terms)
            .unwrap_or_default();

        if let Some(results) = document.get_mut("results").and_then(Value::as_array_mut) {
            for result in results.iter_mut() {
                let Some(object) = result.as_object_mut() else {
                    continue;
                };
                if self.options.highlights.enabled && !terms.is_empty() {
                    apply_highlighting(object, &terms, &self.options.highlights);
                }
                if self.options.summarization.enabled {
                    apply_summary(object, self.options.summarization.max_length);
                }
                if self.options.format_dates {
                    format_dates(object);
                }
            }
        }

        if self.options.grouping.enabled {
            let grouped = document
                .get("results")
                .and_then(Value::as_array)
                .map(|results| group_results(results, &self.options.grouping.field));
            if let (Some(grouped), Some(object)) = (grouped, document.as_object_mut()) {
                object.insert("groupedResults".to_string(), grouped);
                object.insert(
                    "groupField".to_string(),
                    Value::String(self.options.grouping.field.clone()),
                );
            }
        }

        document
    }
}

fn apply_highlighting(result: &mut Map<String, Value>, terms: &[String], options: &HighlightConfig) {
    let mut highlights = Map::new();

    for field in ["title", "description"] {
        let Some(text) = result.get(field).and_then(Value::as_str) else {
            continue;
        };
        let chars: Vec<char> = text.chars().collect();
        let positions = match_positions(&chars, terms);
        if positions.is_empty() {
            continue;
        }

        let highlighted = wrap_matches(&chars, &positions, &options.tag_open, &options.tag_close);
        let fragments =
            extract_fragments(&chars, &positions, options.max_fragments, options.fragment_size);

        let key = format!("highlighted{}{}", field[..1].to_uppercase(), &field[1..]);
        result.insert(key, Value::String(highlighted));
        highlights.insert(
            field.to_string(),
            Value::Array(fragments.into_iter().map(Value::String).collect()),
        );
    }

    if !highlights.is_empty() {
        debug!("Highlighted {} fields", highlights.len());
        result.insert("highlights".to_string(), Value::Object(highlights));
    }
}

/// Non-overlapping `(start, end)` character spans of all term occurrences,
/// case-insensitive, earlier spans winning overlaps.
pub(crate) fn match_positions(chars: &[char], terms: &[String]) -> Vec<(usize, usize)> {
    let lowered: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let mut positions: Vec<(usize, usize)> = Vec::new();
    for term in terms {
        let term_chars: Vec<char> = term.chars().collect();
        if term_chars.is_empty() || term_chars.len() > lowered.len() {
            continue;
        }
        let mut start = 0;
        while start + term_chars.len() <= lowered.len() {
            if lowered[start..start + term_chars.len()] == term_chars[..] {
                positions.push((start, start + term_chars.len()));
                start += 1;
            } else {
                start += 1;
            }
        }
    }
    positions.sort_unstable();

    let mut kept: Vec<(usize, usize)> = Vec::new();
    for (start, end) in positions {
        if kept
            .iter()
            .any(|&(kept_start, kept_end)| start < kept_end && end > kept_start)
        {
            continue;
        }
        kept.push((start, end));
    }
    kept
}

/// Wrap spans in reverse order so earlier indices stay valid.
fn wrap_matches(
    chars: &[char],
    positions: &[(usize, usize)],
    tag_open: &str,
    tag_close: &str,
) -> String {
    let mut output: Vec<char> = chars.to_vec();
    for &(start, end) in positions.iter().rev() {
        output.splice(end..end, tag_close.chars());
        output.splice(start..start, tag_open.chars());
    }
    output.into_iter().collect()
}

fn extract_fragments(
    chars: &[char],
    positions: &[(usize, usize)],
    max_fragments: usize,
    fragment_size: usize,
) -> Vec<String> {
    let mut fragments = Vec::new();
    for &(start, end) in positions.iter().take(max_fragments) {
        let fragment_start = start.saturating_sub(fragment_size / 2);
        let fragment_end = (end + fragment_size / 2).min(chars.len());

        let mut fragment: String = chars[fragment_start..fragment_end].iter().collect();
        if fragment_start > 0 {
            fragment = format!("...{fragment}");
        }
        if fragment_end < chars.len() {
            fragment.push_str("...");
        }
        fragments.push(fragment);
    }
    fragments
}

fn apply_summary(result: &mut Map<String, Value>, max_length: usize) {
    let Some(description) = result.get("description").and_then(Value::as_str) else {
        return;
    };
    let chars: Vec<char> = description.chars().collect();
    let summary = if chars.len() > max_length {
        let cutoff = sentence_cutoff(&chars, max_length, 40);
        let cut: String = chars[..cutoff].iter().collect();
        format!("{}...", cut.trim())
    } else {
        description.to_string()
    };
    result.insert("summary".to_string(), Value::String(summary));
}

/// Emit `<field>Formatted` companions for ISO-8601 values: date-times as
/// `YYYY-MM-DD HH:mm`, bare dates as `YYYY-MM-DD`.
fn format_dates(result: &mut Map<String, Value>) {
    let mut formatted: Vec<(String, String)> = Vec::new();

    for (key, value) in result.iter() {
        let Some(raw) = value.as_str() else { continue };
        if key.ends_with("Formatted") {
            continue;
        }
        if let Ok(datetime) = raw.parse::<DateTime<Utc>>() {
            formatted.push((
                format!("{key}Formatted"),
                datetime.format("%Y-%m-%d %H:%M").to_string(),
            ));
        } else if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            formatted.push((format!("{key}Formatted"), date.format("%Y-%m-%d").to_string()));
        }
    }

    for (key, value) in formatted {
        result.insert(key, Value::String(value));
    }
}

fn group_results(results: &[Value], field: &str) -> Value {
    let mut groups: Map<String, Value> = Map::new();
    for result in results {
        let key = result
            .get(field)
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "other".to_string());
        let bucket = groups
            .entry(key)
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(items) = bucket {
            items.push(result.clone());
        }
    }
    Value::Object(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryBuilder, ResourceType};
    use crate::result::SearchResult;
    use pretty_assertions::assert_eq;
    use waypoint_config::search::GroupingConfig;

    fn sample_response(text: &str, results: Vec<SearchResult>) -> SearchResponse {
        let query = QueryBuilder::new()
            .parse(&format!("type:issue,project {text}"))
            .unwrap();
        SearchResponse {
            total_count: results.len() as u64,
            results,
            has_more: false,
            cursor: None,
            query,
            execution_time_ms: None,
            cache_hit: false,
        }
    }

    fn result(id: &str, resource_type: ResourceType, title: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            resource_type,
            title: title.to_string(),
            url: None,
            description: None,
            identifier: None,
            created_at: None,
            updated_at: None,
            team: None,
            additional_data: serde_json::Map::new(),
            score: None,
            description_truncated: None,
        }
    }

    #[test]
    fn highlights_wrap_matches_without_shifting() {
        let formatter = ResultFormatter::new(FormattingConfig::default());
        let response = sample_response(
            "login",
            vec![result("1", ResourceType::Issue, "Login page login form")],
        );

        let document = formatter.format_response(&response);
        let highlighted = document["results"][0]["highlightedTitle"]
            .as_str()
            .unwrap();
        assert_eq!(highlighted, "<mark>Login</mark> page <mark>login</mark> form");
    }

    #[test]
    fn zero_matches_yield_no_highlight_fields() {
        let formatter = ResultFormatter::new(FormattingConfig::default());
        let response = sample_response(
            "missing",
            vec![result("1", ResourceType::Issue, "Unrelated title")],
        );

        let document = formatter.format_response(&response);
        assert!(document["results"][0].get("highlightedTitle").is_none());
        assert!(document["results"][0].get("highlights").is_none());
    }

    #[test]
    fn fragments_carry_ellipses_around_context() {
        let formatter = ResultFormatter::new(FormattingConfig::default());
        let mut r = result("1", ResourceType::Issue, "Title login");
        r.description = Some(format!("{} login {}", "x".repeat(200), "y".repeat(200)));
        let response = sample_response("login", vec![r]);

        let document = formatter.format_response(&response);
        let fragments = document["results"][0]["highlights"]["description"]
            .as_array()
            .unwrap();
        assert_eq!(fragments.len(), 1);
        let fragment = fragments[0].as_str().unwrap();
        assert!(fragment.starts_with("..."));
        assert!(fragment.ends_with("..."));
        assert!(fragment.contains("login"));
    }

    #[test]
    fn overlapping_terms_keep_first_span() {
        let chars: Vec<char> = "interconnect".chars().collect();
        let positions = match_positions(
            &chars,
            &["interconnect".to_string(), "connect".to_string()],
        );
        assert_eq!(positions, vec![(0, 12)]);
    }

    #[test]
    fn dates_get_formatted_companions() {
        let formatter = ResultFormatter::new(FormattingConfig::default());
        let mut r = result("1", ResourceType::Issue, "Dated");
        r.updated_at = Some("2026-07-15T09:30:00Z".to_string());
        let mut with_due = r.clone();
        with_due
            .additional_data
            .insert("dueDate".to_string(), Value::String("2026-08-01".to_string()));
        let response = sample_response("dated", vec![with_due]);

        let document = formatter.format_response(&response);
        let first = &document["results"][0];
        assert_eq!(first["updatedAtFormatted"], "2026-07-15 09:30");
    }

    #[test]
    fn grouping_collates_by_type() {
        let options = FormattingConfig {
            grouping: GroupingConfig {
                enabled: true,
                field: "type".to_string(),
            },
            ..FormattingConfig::default()
        };
        let formatter = ResultFormatter::new(options);
        let response = sample_response(
            "anything",
            vec![
                result("1", ResourceType::Issue, "One"),
                result("2", ResourceType::Project, "Two"),
                result("3", ResourceType::Issue, "Three"),
            ],
        );

        let document = formatter.format_response(&response);
        let grouped = document["groupedResults"].as_object().unwrap();
        assert_eq!(grouped["issue"].as_array().unwrap().len(), 2);
        assert_eq!(grouped["project"].as_array().unwrap().len(), 1);
        assert_eq!(document["groupField"], "type");
    }
}
