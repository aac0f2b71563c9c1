pub mod resource;
pub mod schema;
pub mod tool;

pub use resource::{ResourceOperation, ResourceProvider, ResourceProviderRegistry};
pub use tool::{ToolMetadata, ToolProvider, ToolProviderRegistry};
