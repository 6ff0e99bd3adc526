//! Application configuration
//!
//! Configuration lives as a single JSON document in the SQLite database and is
//! cached in memory for lock-free reads.

mod schema;
mod store;

pub use schema::{AppConfig, AuthConfig, LiveConfig, UpstreamConfig, WebConfig};
pub use store::ConfigStore;
