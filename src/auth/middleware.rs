use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tracing::warn;

use super::SessionUser;
use crate::error::AppError;
use crate::state::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "radio_session";

/// Extract session ID from request
pub fn extract_session_id(cookies: &CookieJar, headers: &HeaderMap) -> Option<String> {
    // First try cookie
    if let Some(cookie) = cookies.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    // Then try Authorization header (Bearer token)
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the signed-in user, if any
///
/// Lookup failures are logged and treated as anonymous so that a database
/// hiccup degrades the caller to a guest instead of failing the request.
pub async fn current_user(
    state: &AppState,
    cookies: &CookieJar,
    headers: &HeaderMap,
) -> Option<SessionUser> {
    let session_id = extract_session_id(cookies, headers)?;
    match state.sessions.user_for_session(&session_id).await {
        Ok(user) => user,
        Err(e) => {
            warn!("Session lookup failed: {}", e);
            None
        }
    }
}

/// Admin-only middleware
///
/// Responds 401 without a valid session and 403 for non-admin users. The
/// resolved [`SessionUser`] is inserted into the request extensions.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    cookies: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = current_user(&state, &cookies, request.headers())
        .await
        .ok_or(AppError::Unauthorized)?;

    if !user.is_admin {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
