use axum::{extract::State, Json};
use std::sync::Arc;

use crate::listeners::ListenerStats;
use crate::state::AppState;

/// Listener breakdown for the admin dashboard
pub async fn listener_stats(State(state): State<Arc<AppState>>) -> Json<ListenerStats> {
    Json(state.listeners.stats())
}
