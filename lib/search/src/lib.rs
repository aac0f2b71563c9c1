pub mod cache;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod optimizer;
pub mod query;
pub mod result;
pub mod shaping;

pub use cache::{CacheStats, SearchCache};
pub use engine::SearchEngine;
pub use error::SearchError;
pub use formatter::ResultFormatter;
pub use optimizer::SearchOptimizer;
pub use query::{Condition, Operator, QueryBuilder, ResourceType, SearchQuery, SortDirection, SortOption};
pub use result::{SearchResponse, SearchResult};
pub use shaping::{ResponseMode, ResponseShaper};
