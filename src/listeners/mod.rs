//! Active listeners
//!
//! Tracks who is connected to the live feed, for the public "who's listening"
//! widget, the admin dashboard and for gating listening rewards to users who
//! are actually playing.

mod registry;
mod types;

pub use registry::{ListenerRegistry, DEFAULT_INACTIVITY_TIMEOUT};
pub use types::{
    ActiveListeners, ListenerCounts, ListenerId, ListenerSnapshot, ListenerStats, UserId,
};
