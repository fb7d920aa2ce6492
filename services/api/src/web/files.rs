//! services/api/src/web/files.rs
//!
//! Endpoints that move files in and out of a session: resource uploads,
//! resource replacement, and `.docpack` import/export.

use crate::adapters::export::safe_file_stem;
use crate::error::ApiError;
use crate::web::{protocol::SessionSnapshot, state::SessionHandle, state::AppState};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::Utc;
use document_generator_core::{
    convert::is_supported_resource, docpack::is_docpack, document_from_outline, is_docx,
    pack_outline,
    ports::{DocpackCodec, PortError, TextExtractor},
    unpack_outline, Document, ImportOptions, OutlineError, Resource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

fn bad_multipart(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Failed to read multipart data: {}", e))
}

/// Keeps only the final path component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> Option<String> {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// Where an upload named `file_name` lands, if its type is accepted.
fn upload_path(directory: &Path, file_name: &str) -> Result<PathBuf, ApiError> {
    let path = directory.join(file_name);
    if !is_supported_resource(&path) {
        return Err(OutlineError::UnsupportedResourceType { path }.into());
    }
    Ok(path)
}

/// Writes an upload to `path`. The data is staged next to it first, so a
/// rejected `.docx` never replaces a file that is already there.
async fn store_upload(
    path: &Path,
    data: &Bytes,
    extractor: &Arc<dyn TextExtractor>,
) -> Result<(), ApiError> {
    if let Some(directory) = path.parent() {
        tokio::fs::create_dir_all(directory).await?;
    }
    let mut staged = path.as_os_str().to_owned();
    staged.push(".upload");
    let staged = PathBuf::from(staged);
    tokio::fs::write(&staged, data).await?;

    if is_docx(path) {
        let extractor = extractor.clone();
        let checked = staged.clone();
        let readable = tokio::task::spawn_blocking(move || extractor.extract_text(&checked)).await?;
        if let Err(e) = readable {
            tokio::fs::remove_file(&staged).await?;
            return Err(match e {
                PortError::Protected(_) => OutlineError::ProtectedDocument {
                    path: path.to_path_buf(),
                },
                other => OutlineError::Port(other),
            }
            .into());
        }
    }
    tokio::fs::rename(&staged, path).await?;
    Ok(())
}

//=========================================================================================
// Resources
//=========================================================================================

/// Upload one or more reference files into the session.
///
/// Files are registered as resources titled after their file name; files
/// already registered under the same path are overwritten in place.
/// Protected or encrypted `.docx` files are refused.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/resources",
    request_body(content_type = "multipart/form-data", description = "One or more text or .docx files."),
    responses(
        (status = 200, description = "Resources added", body = SessionSnapshot),
        (status = 400, description = "No file in the request"),
        (status = 422, description = "Unsupported file type or protected document")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn upload_resources_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let files_dir = session.lock().await.files_dir();

    let mut uploaded = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let Some(file_name) = field.file_name().and_then(sanitize_file_name) else {
            continue;
        };
        let path = upload_path(&files_dir, &file_name)?;
        let data = field.bytes().await.map_err(bad_multipart)?;
        store_upload(&path, &data, &app_state.extractor).await?;
        uploaded.push(path);
    }
    if uploaded.is_empty() {
        return Err(ApiError::BadRequest(
            "Multipart form must include a file".to_string(),
        ));
    }

    let mut session = session.lock().await;
    let mut draft = session.document.clone();
    for path in uploaded {
        draft.add_resource(Resource::from_path(path));
    }
    session.replace_document(draft)?;
    Ok(Json(session.snapshot()))
}

/// Replace the file behind a resource, keeping its key, title and description.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/resources/replace",
    request_body(content_type = "multipart/form-data", description = "An `old_path` text field and the new `file`."),
    responses(
        (status = 200, description = "Resource replaced", body = SessionSnapshot),
        (status = 400, description = "Missing field"),
        (status = 404, description = "Unknown resource"),
        (status = 409, description = "The new file belongs to another resource"),
        (status = 422, description = "Unsupported file type or protected document")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn replace_resource_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let mut old_path: Option<PathBuf> = None;
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "old_path" => old_path = Some(PathBuf::from(field.text().await.map_err(bad_multipart)?)),
            "file" => {
                let file_name = field
                    .file_name()
                    .and_then(sanitize_file_name)
                    .ok_or_else(|| ApiError::BadRequest("The file part needs a file name".to_string()))?;
                upload = Some((file_name, field.bytes().await.map_err(bad_multipart)?));
            }
            _ => {}
        }
    }
    let old_path =
        old_path.ok_or_else(|| ApiError::BadRequest("old_path field is required".to_string()))?;
    let (file_name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("file field is required".to_string()))?;

    let mut session = session.lock().await;
    if session.document.resource(&old_path).is_none() {
        return Err(OutlineError::ResourceNotFound(old_path).into());
    }
    let new_path = upload_path(&session.files_dir(), &file_name)?;
    if new_path != old_path && session.document.resource(&new_path).is_some() {
        return Err(OutlineError::DuplicateResource(new_path).into());
    }
    store_upload(&new_path, &data, &app_state.extractor).await?;

    let mut draft = session.document.clone();
    draft.replace_resource_file(&old_path, &new_path)?;
    session.replace_document(draft)?;
    Ok(Json(session.snapshot()))
}

//=========================================================================================
// Docpack Bundles
//=========================================================================================

/// Replace the session's document with the contents of a `.docpack` bundle.
#[utoipa::path(
    post,
    path = "/sessions/{session_id}/docpack",
    request_body(content_type = "multipart/form-data", description = "A single `.docpack` file."),
    responses(
        (status = 200, description = "Bundle imported", body = SessionSnapshot),
        (status = 400, description = "Missing or non-docpack file"),
        (status = 422, description = "Bundle content rejected")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn import_docpack_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let field = multipart
        .next_field()
        .await
        .map_err(bad_multipart)?
        .ok_or_else(|| ApiError::BadRequest("Multipart form must include a file".to_string()))?;
    let file_name = field.file_name().unwrap_or_default().to_string();
    if !is_docpack(Path::new(&file_name)) {
        return Err(ApiError::BadRequest(
            "Only .docpack files created by the Save function can be imported".to_string(),
        ));
    }
    let data = field.bytes().await.map_err(bad_multipart)?;

    let bundles_dir = session.lock().await.bundles_dir();
    let bundle_id = Uuid::new_v4();
    let archive = bundles_dir.join(format!("{}.docpack", bundle_id));
    let destination = bundles_dir.join(bundle_id.to_string());
    tokio::fs::create_dir_all(&bundles_dir).await?;
    tokio::fs::write(&archive, &data).await?;

    let document = import_bundle(
        archive,
        destination,
        app_state.codec.clone(),
        app_state.extractor.clone(),
    )
    .await?;

    let mut session = session.lock().await;
    session.replace_document(document)?;
    session.generated_markdown = None;
    info!(session_id = %session.id, bundle = %file_name, "Docpack imported");
    Ok(Json(session.snapshot()))
}

/// Unpacks `archive` into `destination` and imports the outline it carries,
/// off the async runtime. The archive is deleted once unpacked.
async fn import_bundle(
    archive: PathBuf,
    destination: PathBuf,
    codec: Arc<dyn DocpackCodec>,
    extractor: Arc<dyn TextExtractor>,
) -> Result<Document, ApiError> {
    let document = tokio::task::spawn_blocking(move || {
        let outline = unpack_outline(&archive, codec.as_ref(), &destination)?;
        if let Err(e) = std::fs::remove_file(&archive) {
            warn!(archive = %archive.display(), "Failed to remove unpacked archive: {}", e);
        }
        document_from_outline(
            &outline,
            &ImportOptions {
                base_dir: Some(destination),
                ..ImportOptions::default()
            },
            extractor.as_ref(),
        )
    })
    .await??;
    Ok(document)
}

/// Download the session's outline and resource files as a `.docpack` bundle.
#[utoipa::path(
    get,
    path = "/sessions/{session_id}/docpack",
    responses(
        (status = 200, description = "The bundle", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown session")
    ),
    params(("session_id" = Uuid, Path, description = "The session id."))
)]
pub async fn export_docpack_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(session): Extension<SessionHandle>,
) -> Result<impl IntoResponse, ApiError> {
    let (outline, exports_dir) = {
        let mut session = session.lock().await;
        session.regenerate_outline()?;
        (session.outline.clone(), session.exports_dir())
    };

    let file_name = format!(
        "{}_{}.docpack",
        safe_file_stem(&outline.title),
        Utc::now().format("%Y%m%d_%H%M%S")
    );
    let path = exports_dir.join(&file_name);
    let codec = app_state.codec.clone();
    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ApiError> {
        pack_outline(&outline, codec.as_ref(), &path)?;
        let bytes = std::fs::read(&path)?;
        // The response carries the bundle; nothing needs the file afterwards.
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), "Failed to remove exported bundle: {}", e);
        }
        Ok(bytes)
    })
    .await??;

    Ok((
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_generator_core::ports::PlainTextOnly;
    use tempfile::TempDir;

    const ENCRYPTED_OFFICE_HEADER: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

    #[test]
    fn client_file_names_lose_their_directories() {
        assert_eq!(sanitize_file_name("../../etc/notes.md").as_deref(), Some("notes.md"));
        assert_eq!(sanitize_file_name("plain.txt").as_deref(), Some("plain.txt"));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name(".."), None);
    }

    #[test]
    fn only_supported_types_get_an_upload_path() {
        let dir = Path::new("/sessions/x/files");
        assert_eq!(upload_path(dir, "brief.docx").unwrap(), dir.join("brief.docx"));
        assert!(matches!(
            upload_path(dir, "deck.pptx"),
            Err(ApiError::Outline(OutlineError::UnsupportedResourceType { .. }))
        ));
    }

    #[tokio::test]
    async fn protected_docx_upload_keeps_the_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("brief.docx");
        std::fs::write(&path, "earlier upload").unwrap();
        let extractor: Arc<dyn TextExtractor> = Arc::new(crate::adapters::DocxTextExtractor);

        let err = store_upload(&path, &Bytes::from_static(ENCRYPTED_OFFICE_HEADER), &extractor)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::Outline(OutlineError::ProtectedDocument { ref path }) if path.ends_with("brief.docx")
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier upload");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn text_uploads_are_written_in_place() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("files").join("notes.md");
        let extractor: Arc<dyn TextExtractor> = Arc::new(PlainTextOnly);

        store_upload(&path, &Bytes::from_static(b"# Notes"), &extractor)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Notes");
    }

    #[tokio::test]
    async fn imported_bundle_replaces_the_archive_with_its_contents() {
        use crate::adapters::ZipDocpackCodec;
        use document_generator_core::{build_outline, Block};

        let work = TempDir::new().unwrap();
        let notes = work.path().join("notes.md");
        std::fs::write(&notes, "Ship it.").unwrap();
        let mut document = Document {
            title: "Release".into(),
            resources: vec![Resource::from_path(&notes)],
            blocks: vec![Block::text("Notes", "")],
            ..Document::default()
        };
        let block = document.blocks[0].id;
        document.attach_resource(block, &notes, &PlainTextOnly).unwrap();
        let outline = build_outline(&document, work.path()).unwrap();

        let bundles = TempDir::new().unwrap();
        let archive = bundles.path().join("upload.docpack");
        let destination = bundles.path().join("upload");
        pack_outline(&outline, &ZipDocpackCodec, &archive).unwrap();

        let imported = import_bundle(
            archive.clone(),
            destination.clone(),
            Arc::new(ZipDocpackCodec),
            Arc::new(PlainTextOnly),
        )
        .await
        .unwrap();

        assert_eq!(imported.blocks[0].body.content(), "Ship it.");
        assert!(imported.resources[0]
            .path
            .starts_with(destination.canonicalize().unwrap()));
        assert!(!archive.exists());
    }
}
