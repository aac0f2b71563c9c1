pub mod capabilities;
pub mod error;
pub mod providers;
pub mod registry;
pub mod server;
pub mod session;
pub mod shared_state;
pub mod sinks;
pub mod tools;
pub mod version;

pub const SERVER_NAME: &str = "Waypoint";
pub const SERVER_VENDOR: &str = "Waypoint";
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Namespace prefix for all registered tools and resources.
pub const NAMESPACE: &str = "tracker";
