//! radio-live - live now-playing feed for a community web radio
//!
//! Polls the radio engine for the current track, fans updates out to every
//! connected browser over server-sent events and keeps a registry of who is
//! listening right now.

pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod listeners;
pub mod live;
pub mod state;
pub mod upstream;
pub mod utils;
pub mod web;

pub use error::{AppError, Result};
