pub mod client;
pub mod error;
pub mod rate_limit;
pub mod resources;

pub use client::{ApiClient, Page, Paginator};
pub use error::UpstreamError;
