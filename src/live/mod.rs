//! Live push connections
//!
//! Glue between an HTTP server-push response, the broadcast hub and the
//! listener registry.

mod connection;

pub use connection::{ListenerIdentity, LiveConnection, GUEST_NAME, KEEPALIVE_INTERVAL};
