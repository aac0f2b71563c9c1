use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use waypoint_config::search::{OptimizerConfig, RelevanceConfig};

use crate::result::{SearchResponse, SearchResult};

/// Optimizer for search results: relevance scoring, deduplication, per-type
/// and total limits, and description trimming.
///
/// This scorer is authoritative; the formatter presents the score it
/// produced and never recomputes it.
pub struct SearchOptimizer {
    config: OptimizerConfig,
}

impl SearchOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn optimize(&self, response: SearchResponse) -> SearchResponse {
        if !self.config.enabled {
            return response;
        }

        let original_len = response.results.len();
        let mut results = response.results;

        if let Some(text) = &response.query.text {
            let terms = extract_terms(text);
            if !terms.is_empty() {
                for result in &mut results {
                    result.score =
                        Some(relevance_score(result, &terms, &self.config.relevance));
                }
                results.sort_by(|a, b| {
                    b.score
                        .unwrap_or(0.0)
                        .partial_cmp(&a.score.unwrap_or(0.0))
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
        }

        if self.config.deduplicate {
            results = deduplicate(results);
        }

        results = self.limit(results);

        if self.config.trim_descriptions {
            for result in &mut results {
                self.trim_description(result);
            }
        }

        debug!(
            "Optimized search response: {} results (from {original_len} original)",
            results.len()
        );

        let has_more = response.has_more || results.len() < original_len;
        SearchResponse {
            results,
            has_more,
            ..response
        }
    }

    /// Enforce `max_results_per_type` per resource type, then
    /// `max_total_results` overall. Within a type, higher score wins.
    fn limit(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        let mut kept: Vec<SearchResult> = Vec::with_capacity(results.len());
        let mut per_type: std::collections::HashMap<crate::query::ResourceType, usize> =
            std::collections::HashMap::new();

        // Results arrive score-descending when scored, so first-kept wins.
        for result in results {
            let count = per_type.entry(result.resource_type).or_insert(0);
            if *count >= self.config.max_results_per_type {
                continue;
            }
            *count += 1;
            kept.push(result);
        }

        if kept.iter().any(|r| r.score.is_some()) {
            kept.sort_by(|a, b| {
                b.score
                    .unwrap_or(0.0)
                    .partial_cmp(&a.score.unwrap_or(0.0))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        kept.truncate(self.config.max_total_results);
        kept
    }

    fn trim_description(&self, result: &mut SearchResult) {
        let Some(description) = &result.description else {
            return;
        };
        let chars: Vec<char> = description.chars().collect();
        if chars.len() <= self.config.max_description_length {
            return;
        }

        let cutoff = sentence_cutoff(&chars, self.config.max_description_length, 40);
        let trimmed: String = chars[..cutoff].iter().collect();
        result.description = Some(format!("{}...", trimmed.trim()));
        result.description_truncated = Some(true);
    }
}

/// Cut position at the nearest sentence boundary (`.`, `?`, `!` followed by
/// a space) within `lookback` characters of `max_len`.
pub(crate) fn sentence_cutoff(chars: &[char], max_len: usize, lookback: usize) -> usize {
    let mut cutoff = max_len.min(chars.len());
    let floor = cutoff.saturating_sub(lookback);
    let mut i = cutoff.saturating_sub(5);
    while i > floor {
        if matches!(chars[i], '.' | '?' | '!') && chars.get(i + 1) == Some(&' ') {
            cutoff = i + 1;
            break;
        }
        i -= 1;
    }
    cutoff
}

/// Alphanumeric terms of length ≥ 3, lowercased, with boolean operators
/// stripped and duplicates removed (first occurrence kept).
pub fn extract_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.len() < 3 {
            continue;
        }
        let lowered = word.to_lowercase();
        if matches!(lowered.as_str(), "and" | "or" | "not") {
            continue;
        }
        if seen.insert(lowered.clone()) {
            terms.push(lowered);
        }
    }
    terms
}

fn relevance_score(result: &SearchResult, terms: &[String], config: &RelevanceConfig) -> f64 {
    let denominator = terms.len().max(1) as f64;

    let title = result.title.to_lowercase();
    let title_score =
        (field_match_score(&title, terms, config, true) / denominator).min(config.max_score);

    let description = result
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    // Description matches carry a third of the weight per term.
    let description_score = (field_match_score(&description, terms, config, true)
        / (denominator * 3.0))
        .min(config.max_score);

    let identifier = result
        .identifier
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let identifier_score =
        (field_match_score(&identifier, terms, config, false) / denominator).min(config.max_score);

    let recency_score = result
        .updated_at
        .as_deref()
        .and_then(recency_factor(config.recency_decay_days))
        .map(|f| f.min(config.max_score))
        .unwrap_or(0.0);

    let weight_sum = config.title_weight
        + config.description_weight
        + config.identifier_weight
        + config.recency_weight;
    let weighted = title_score * config.title_weight
        + description_score * config.description_weight
        + identifier_score * config.identifier_weight
        + recency_score * config.recency_weight;

    (weighted / weight_sum).clamp(config.min_score, config.max_score)
}

/// Accumulate exact-match boosts per term, falling back to a partial-match
/// boost when any word of the field overlaps the term.
fn field_match_score(
    field: &str,
    terms: &[String],
    config: &RelevanceConfig,
    allow_partial: bool,
) -> f64 {
    let mut score = 0.0;
    for term in terms {
        if field.contains(term.as_str()) {
            score += config.exact_match_boost;
        } else if allow_partial {
            for word in field.split_whitespace() {
                if word.contains(term.as_str()) || term.contains(word) {
                    score += config.partial_match_boost;
                    break;
                }
            }
        }
    }
    score
}

/// `2^(-days_since_update / decay_days)`.
fn recency_factor(decay_days: u32) -> impl Fn(&str) -> Option<f64> {
    move |updated_at: &str| {
        let updated: DateTime<Utc> = updated_at.parse().ok()?;
        let days = (Utc::now() - updated).num_days() as f64;
        Some((-days / decay_days as f64).exp2())
    }
}

fn deduplicate(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut seen_identifiers: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(results.len());

    for result in results {
        let title = result.title.to_lowercase();
        let identifier = result
            .identifier
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();

        if (!title.is_empty() && seen_titles.contains(&title))
            || (!identifier.is_empty() && seen_identifiers.contains(&identifier))
        {
            continue;
        }
        if !title.is_empty() {
            seen_titles.insert(title);
        }
        if !identifier.is_empty() {
            seen_identifiers.insert(identifier);
        }
        kept.push(result);
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryBuilder, ResourceType};
    use serde_json::Map;

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
            additional_data: Map::new(),
            score: None,
            description_truncated: None,
        }
    }

    fn response_with(results: Vec<SearchResult>, dsl: &str) -> SearchResponse {
        let query = QueryBuilder::new().parse(dsl).unwrap();
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

    #[test]
    fn terms_strip_operators_and_short_words() {
        let terms = extract_terms("broken AND login OR ui on-call");
        assert_eq!(terms, vec!["broken", "login", "call"]);
    }

    #[test]
    fn duplicate_terms_are_removed() {
        let terms = extract_terms("login login LOGIN");
        assert_eq!(terms, vec!["login"]);
    }

    #[test]
    fn scores_are_within_bounds() {
        let mut matching = result("1", ResourceType::Issue, "Broken login flow");
        matching.updated_at = Some(Utc::now().to_rfc3339());
        let unrelated = result("2", ResourceType::Issue, "Quarterly planning");

        let optimizer = SearchOptimizer::new(OptimizerConfig::default());
        let response = optimizer.optimize(response_with(
            vec![matching, unrelated],
            "type:issue broken login",
        ));

        for r in &response.results {
            let score = r.score.expect("expected a score");
            assert!((0.1..=1.0).contains(&score), "score {score} out of bounds");
        }
        assert_eq!(response.results[0].id, "1");
    }

    #[test]
    fn title_matches_outrank_unrelated_titles() {
        let a = result("a", ResourceType::Issue, "Broken login");
        let b = result("b", ResourceType::Issue, "Something else entirely");

        let optimizer = SearchOptimizer::new(OptimizerConfig::default());
        let response =
            optimizer.optimize(response_with(vec![b, a], "type:issue broken login"));

        assert_eq!(response.results[0].id, "a");
        assert!(response.results[0].score > response.results[1].score);
    }

    #[test]
    fn duplicate_titles_collapse_first_wins() {
        let results = vec![
            result("1", ResourceType::Issue, "Same Title"),
            result("2", ResourceType::Project, "same title"),
            result("3", ResourceType::Issue, "Different"),
        ];

        let optimizer = SearchOptimizer::new(OptimizerConfig::default());
        let response = optimizer.optimize(response_with(results, "type:issue,project x"));

        let ids: Vec<&str> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert!(response.has_more);
    }

    #[test]
    fn per_type_limit_applies_before_total_limit() {
        let config = OptimizerConfig {
            max_results_per_type: 2,
            max_total_results: 3,
            ..OptimizerConfig::default()
        };
        let results = vec![
            result("i1", ResourceType::Issue, "alpha"),
            result("i2", ResourceType::Issue, "beta"),
            result("i3", ResourceType::Issue, "gamma"),
            result("p1", ResourceType::Project, "delta"),
            result("p2", ResourceType::Project, "epsilon"),
        ];

        let optimizer = SearchOptimizer::new(config);
        let response = optimizer.optimize(response_with(results, "type:issue,project x"));

        assert_eq!(response.results.len(), 3);
        let issue_count = response
            .results
            .iter()
            .filter(|r| r.resource_type == ResourceType::Issue)
            .count();
        assert_eq!(issue_count, 2);
    }

    #[test]
    fn long_descriptions_trim_at_sentence_boundary() {
        let mut r = result("1", ResourceType::Issue, "Title");
        let sentence = "This sentence ends here. ";
        r.description = Some(sentence.repeat(20));

        let optimizer = SearchOptimizer::new(OptimizerConfig::default());
        let response = optimizer.optimize(response_with(vec![r], "type:issue title"));

        let trimmed = response.results[0].description.as_ref().unwrap();
        assert!(trimmed.len() < 320);
        assert!(trimmed.ends_with("..."));
        assert!(trimmed.trim_end_matches("...").ends_with('.'));
        assert_eq!(response.results[0].description_truncated, Some(true));
    }

    #[test]
    fn disabled_optimizer_passes_through() {
        let config = OptimizerConfig {
            enabled: false,
            ..OptimizerConfig::default()
        };
        let results = vec![
            result("1", ResourceType::Issue, "Same"),
            result("2", ResourceType::Issue, "Same"),
        ];
        let optimizer = SearchOptimizer::new(config);
        let response = optimizer.optimize(response_with(results, "type:issue same"));
        assert_eq!(response.results.len(), 2);
        assert!(response.results[0].score.is_none());
    }
}
