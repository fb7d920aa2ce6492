//! services/api/src/web/middleware.rs
//!
//! Session-resolving middleware for the per-session routes.

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Middleware that resolves the `{session_id}` path segment to a live session.
///
/// If found, inserts the session handle into request extensions for handlers to use.
/// Unknown ids are answered with 404 before any handler runs.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let handle = state
        .sessions
        .get(session_id)
        .await
        .ok_or(ApiError::SessionNotFound(session_id))?;

    req.extensions_mut().insert(handle);
    Ok(next.run(req).await)
}
