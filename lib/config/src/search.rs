use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// All search-related configuration: engine behavior, cache, optimizer,
/// formatter, and response shaping.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct SearchSectionConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub formatting: FormattingConfig,
    #[serde(default)]
    pub shaping: ShapingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct EngineConfig {
    /// Include result descriptions in search responses.
    #[serde(default = "default_true")]
    pub include_description: bool,

    /// Include archived resources. When disabled, type-specific exclusions
    /// are appended to every filter before dispatch.
    #[serde(default)]
    pub include_archived: bool,

    /// Cap on results requested from the upstream per resource type.
    #[serde(default = "default_engine_max_per_type")]
    pub max_results_per_type: usize,

    /// Outer bound on the whole fan-out, in seconds. Exceeding it abandons
    /// outstanding per-type calls and fails the search.
    #[serde(default = "default_engine_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            include_description: default_true(),
            include_archived: false,
            max_results_per_type: default_engine_max_per_type(),
            timeout_seconds: default_engine_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time to live for cached search responses, in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Maximum number of cached responses before cleanup runs.
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,

    /// Entries accessed fewer times than this are dropped first during
    /// cleanup, after expired entries.
    #[serde(default = "default_cache_min_access_count")]
    pub min_access_count: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ttl_seconds: default_cache_ttl_seconds(),
            max_size: default_cache_max_size(),
            min_access_count: default_cache_min_access_count(),
        }
    }
}

/// Weights and boosts for relevance scoring.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RelevanceConfig {
    #[serde(default = "default_title_weight")]
    pub title_weight: f64,
    #[serde(default = "default_description_weight")]
    pub description_weight: f64,
    #[serde(default = "default_identifier_weight")]
    pub identifier_weight: f64,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,

    /// Days after which the recency score is halved.
    #[serde(default = "default_recency_decay_days")]
    pub recency_decay_days: u32,

    #[serde(default = "default_exact_match_boost")]
    pub exact_match_boost: f64,
    #[serde(default = "default_partial_match_boost")]
    pub partial_match_boost: f64,

    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_max_score")]
    pub max_score: f64,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            title_weight: default_title_weight(),
            description_weight: default_description_weight(),
            identifier_weight: default_identifier_weight(),
            recency_weight: default_recency_weight(),
            recency_decay_days: default_recency_decay_days(),
            exact_match_boost: default_exact_match_boost(),
            partial_match_boost: default_partial_match_boost(),
            min_score: default_min_score(),
            max_score: default_max_score(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct OptimizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub relevance: RelevanceConfig,

    /// Collapse results sharing a lowercased title or identifier.
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    #[serde(default = "default_optimizer_max_per_type")]
    pub max_results_per_type: usize,

    #[serde(default = "default_optimizer_max_total")]
    pub max_total_results: usize,

    /// Trim long descriptions at the nearest sentence boundary.
    #[serde(default = "default_true")]
    pub trim_descriptions: bool,

    #[serde(default = "default_max_description_length")]
    pub max_description_length: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            relevance: RelevanceConfig::default(),
            deduplicate: default_true(),
            max_results_per_type: default_optimizer_max_per_type(),
            max_total_results: default_optimizer_max_total(),
            trim_descriptions: default_true(),
            max_description_length: default_max_description_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct HighlightConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_tag_open")]
    pub tag_open: String,
    #[serde(default = "default_tag_close")]
    pub tag_close: String,
    #[serde(default = "default_max_fragments")]
    pub max_fragments: usize,
    #[serde(default = "default_fragment_size")]
    pub fragment_size: usize,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            tag_open: default_tag_open(),
            tag_close: default_tag_close(),
            max_fragments: default_max_fragments(),
            fragment_size: default_fragment_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GroupingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Result field to group by.
    #[serde(default = "default_group_field")]
    pub field: String,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            field: default_group_field(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SummarizationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_summary_max_length")]
    pub max_length: usize,
}

impl Default for SummarizationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_length: default_summary_max_length(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct FormattingConfig {
    #[serde(default)]
    pub highlights: HighlightConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    #[serde(default)]
    pub summarization: SummarizationConfig,
    /// Emit `<field>Formatted` companions for ISO-8601 date fields.
    #[serde(default = "default_true")]
    pub format_dates: bool,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            highlights: HighlightConfig::default(),
            grouping: GroupingConfig::default(),
            summarization: SummarizationConfig::default(),
            format_dates: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ShapingConfig {
    /// Gzip + base64 responses whose serialized size exceeds the threshold.
    #[serde(default = "default_true")]
    pub compress_large_responses: bool,

    #[serde(default = "default_compression_threshold_bytes")]
    pub compression_threshold_bytes: usize,

    /// Embed only the first page of results and attach a loading-state block.
    #[serde(default = "default_true")]
    pub enable_progressive_loading: bool,

    #[serde(default = "default_results_per_page")]
    pub results_per_page: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,

    /// Attach a performance-metrics block to shaped responses.
    #[serde(default = "default_true")]
    pub include_performance_metrics: bool,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            compress_large_responses: default_true(),
            compression_threshold_bytes: default_compression_threshold_bytes(),
            enable_progressive_loading: default_true(),
            results_per_page: default_results_per_page(),
            max_pages: default_max_pages(),
            max_batch_size: default_max_batch_size(),
            stream_chunk_size: default_stream_chunk_size(),
            include_performance_metrics: default_true(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_engine_max_per_type() -> usize {
    100
}

fn default_engine_timeout_seconds() -> u64 {
    30
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_max_size() -> usize {
    100
}

fn default_cache_min_access_count() -> u64 {
    2
}

fn default_title_weight() -> f64 {
    2.0
}

fn default_description_weight() -> f64 {
    1.0
}

fn default_identifier_weight() -> f64 {
    1.5
}

fn default_recency_weight() -> f64 {
    1.0
}

fn default_recency_decay_days() -> u32 {
    30
}

fn default_exact_match_boost() -> f64 {
    1.5
}

fn default_partial_match_boost() -> f64 {
    1.2
}

fn default_min_score() -> f64 {
    0.1
}

fn default_max_score() -> f64 {
    1.0
}

fn default_optimizer_max_per_type() -> usize {
    50
}

fn default_optimizer_max_total() -> usize {
    100
}

fn default_max_description_length() -> usize {
    300
}

fn default_tag_open() -> String {
    "<mark>".to_string()
}

fn default_tag_close() -> String {
    "</mark>".to_string()
}

fn default_max_fragments() -> usize {
    3
}

fn default_fragment_size() -> usize {
    100
}

fn default_group_field() -> String {
    "type".to_string()
}

fn default_summary_max_length() -> usize {
    150
}

fn default_compression_threshold_bytes() -> usize {
    10 * 1024
}

fn default_results_per_page() -> usize {
    20
}

fn default_max_pages() -> usize {
    10
}

fn default_max_batch_size() -> usize {
    100
}

fn default_stream_chunk_size() -> usize {
    5
}
