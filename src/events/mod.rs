//! Live event broadcasting
//!
//! The [`BroadcastHub`] multiplexes the upstream now-playing feed to every
//! connected server-push client. Events are serialized once per publish into
//! the SSE wire format defined in [`wire`].

pub mod hub;
pub mod types;
pub mod wire;

pub use hub::{BroadcastHub, Frame, SubscriberId, Subscription};
pub use wire::{connected_frame, encode_event, KEEPALIVE_FRAME};
