pub mod files;
pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use middleware::require_session;
pub use rest::{
    apply_command_handler, create_session_handler, delete_session_handler, generate_handler,
    get_session_handler,
};
pub use state::AppState;

/// Builds the API router. Every `/sessions/{session_id}` route goes through
/// `require_session`, so handlers can rely on the session extension being present.
pub fn router(app_state: Arc<AppState>) -> Router {
    let session_routes = Router::new()
        .route(
            "/sessions/{session_id}",
            get(get_session_handler).delete(delete_session_handler),
        )
        .route("/sessions/{session_id}/commands", post(apply_command_handler))
        .route("/sessions/{session_id}/generate", post(generate_handler))
        .route(
            "/sessions/{session_id}/resources",
            post(files::upload_resources_handler),
        )
        .route(
            "/sessions/{session_id}/resources/replace",
            post(files::replace_resource_handler),
        )
        .route(
            "/sessions/{session_id}/docpack",
            get(files::export_docpack_handler).post(files::import_docpack_handler),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ));

    Router::new()
        .route("/sessions", post(create_session_handler))
        .merge(session_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}
