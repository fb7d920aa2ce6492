//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the session and editing endpoints and the
//! master definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::web::{
    files,
    protocol::{EditCommand, GenerateResponse, SessionSnapshot},
    state::{AppState, DraftSession, SessionHandle},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        create_session_handler,
        get_session_handler,
        delete_session_handler,
        apply_command_handler,
        generate_handler,
        files::upload_resources_handler,
        files::replace_resource_handler,
        files::import_docpack_handler,
        files::export_docpack_handler,
    ),
    components(
        schemas(SessionSnapshot, EditCommand, GenerateResponse)
    ),
    tags(
        (name = "Document Generator API", description = "API endpoints for the outline-driven document editor.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Create a new session holding a fresh draft.
#[utoipa::path(
    post,
    path = "/sessions",
    responses(
        (status = 201, description = "Session created successfully", body = SessionSnapshot),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session = DraftSession::create(Uuid::new_v4(), &app_state.config.sessions_root)?;
    let snapshot = session.snapshot();
    app_state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

/// Fetch the current document and outline of a session.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}",
    responses(
        (status = 200, description = "Current session state", body = SessionSnapshot),
        (status = 404, description = "Unknown session")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn get_session_handler(
    Extension(session): Extension<SessionHandle>,
) -> Json<SessionSnapshot> {
    Json(session.lock().await.snapshot())
}

/// Drop a session and everything stored in its directory.
#[utoipa::path(
    delete,
    path = "/sessions/{session_id}",
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Unknown session")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let handle = app_state
        .sessions
        .remove(session_id)
        .await
        .ok_or(ApiError::SessionNotFound(session_id))?;

    let directory = handle.lock().await.directory.clone();
    if let Err(e) = tokio::fs::remove_dir_all(&directory).await {
        error!("Failed to remove session directory {}: {:?}", directory.display(), e);
    }
    info!(%session_id, "Session removed");
    Ok(StatusCode::NO_CONTENT)
}

/// Apply one edit to the session's document.
///
/// The outline is regenerated after every edit. A rejected edit leaves the
/// session unchanged.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/commands",
    request_body = EditCommand,
    responses(
        (status = 200, description = "Edit applied", body = SessionSnapshot),
        (status = 404, description = "Unknown session, block or resource"),
        (status = 422, description = "Edit rejected")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn apply_command_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    Json(command): Json<EditCommand>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let mut session = session.lock().await;
    session.apply(command, app_state.extractor.as_ref())?;
    Ok(Json(session.snapshot()))
}

/// Generate the final document from the session's outline.
///
/// The result is written to the session's exports as `{title}.md` and
/// `{title}.docx`. Each call runs the generation engine once; concurrent calls
/// for the same session are not merged.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/generate",
    responses(
        (status = 200, description = "Document generated", body = GenerateResponse),
        (status = 502, description = "Generation engine failed")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn generate_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<Json<GenerateResponse>, ApiError> {
    // Snapshot what generation needs, then release the lock for the long await.
    let (session_id, mut outline, exports_dir) = {
        let mut session = session.lock().await;
        session.regenerate_outline()?;
        (session.id, session.outline.clone(), session.exports_dir())
    };
    outline.strip_inline_markers();

    let markdown = app_state
        .generator
        .generate_document(&outline, session_id)
        .await?;
    let (markdown_path, docx_path) = {
        let exporter = app_state.exporter.clone();
        let markdown = markdown.clone();
        let title = outline.title.clone();
        tokio::task::spawn_blocking(move || -> Result<_, ApiError> {
            let markdown_path = exporter.export_markdown(&markdown, &exports_dir, &title)?;
            let docx_path = exporter.export_docx(&markdown, &exports_dir, &title)?;
            Ok((markdown_path, docx_path))
        })
        .await??
    };
    info!(%session_id, path = %markdown_path.display(), "Document generated");

    session.lock().await.generated_markdown = Some(markdown.clone());
    Ok(Json(GenerateResponse {
        session_id,
        markdown,
        markdown_path,
        docx_path,
    }))
}
