//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-session draft state.

use crate::config::Config;
use crate::web::protocol::{EditCommand, SessionSnapshot};
use chrono::{DateTime, Utc};
use document_generator_core::{
    build_outline,
    domain::Document,
    outline::Outline,
    ports::{DocpackCodec, DocumentExporter, GenerationService, TextExtractor},
    OutlineResult,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub generator: Arc<dyn GenerationService>,
    pub codec: Arc<dyn DocpackCodec>,
    pub exporter: Arc<dyn DocumentExporter>,
    pub extractor: Arc<dyn TextExtractor>,
    pub sessions: Arc<SessionStore>,
}

//=========================================================================================
// SessionStore
//=========================================================================================

pub type SessionHandle = Arc<Mutex<DraftSession>>;

/// Live sessions by id. Each session is locked on its own, so requests for
/// different sessions never wait on each other.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionStore {
    pub async fn insert(&self, session: DraftSession) -> SessionHandle {
        let id = session.id;
        let handle = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

//=========================================================================================
// DraftSession (Specific to One Editor Session)
//=========================================================================================

/// The state of one editor session. All files the session creates (uploads,
/// inline resources, extracted bundles, exports) live below `directory`.
pub struct DraftSession {
    pub id: Uuid,
    pub directory: PathBuf,
    pub created_at: DateTime<Utc>,
    pub document: Document,
    /// Regenerated after every change to `document`.
    pub outline: Outline,
    pub generated_markdown: Option<String>,
}

impl DraftSession {
    /// Creates the session directory and starts from a fresh draft.
    pub fn create(id: Uuid, sessions_root: &Path) -> OutlineResult<Self> {
        let directory = sessions_root.join(id.to_string());
        fs::create_dir_all(&directory)?;
        let mut session = Self {
            id,
            directory,
            created_at: Utc::now(),
            document: Document::new_draft(),
            outline: Outline::default(),
            generated_markdown: None,
        };
        session.regenerate_outline()?;
        info!(session_id = %id, "Session created");
        Ok(session)
    }

    pub fn files_dir(&self) -> PathBuf {
        self.directory.join("files")
    }

    pub fn inline_dir(&self) -> PathBuf {
        self.directory.join("inline")
    }

    pub fn bundles_dir(&self) -> PathBuf {
        self.directory.join("bundles")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.directory.join("exports")
    }

    pub fn regenerate_outline(&mut self) -> OutlineResult<&Outline> {
        self.outline = build_outline(&self.document, &self.inline_dir())?;
        self.prune_inline_files();
        Ok(&self.outline)
    }

    /// Applies `command` to a copy of the document and only keeps the result
    /// if both the edit and the outline rebuild succeed.
    pub fn apply(&mut self, command: EditCommand, extractor: &dyn TextExtractor) -> OutlineResult<()> {
        let mut draft = self.document.clone();
        command.apply(&mut draft, extractor)?;
        self.replace_document(draft)
    }

    /// Swaps in a new document, keeping the old one if its outline cannot be built.
    pub fn replace_document(&mut self, document: Document) -> OutlineResult<()> {
        let outline = build_outline(&document, &self.inline_dir())?;
        self.document = document;
        self.outline = outline;
        self.prune_inline_files();
        Ok(())
    }

    /// Removes inline text files that the current outline no longer references.
    fn prune_inline_files(&self) {
        let inline_dir = self.inline_dir();
        let Ok(entries) = fs::read_dir(&inline_dir) else {
            return;
        };
        let live: HashSet<&Path> = self
            .outline
            .resources
            .iter()
            .filter(|entry| entry.is_inline)
            .map(|entry| entry.path.as_path())
            .collect();

        for entry in entries.flatten() {
            let path = entry.path();
            let is_inline_file = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("inline_") && name.ends_with(".txt"));
            if !is_inline_file || live.contains(path.as_path()) {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                warn!(session_id = %self.id, path = %path.display(), "Failed to remove stale inline file: {}", e);
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            created_at: self.created_at,
            document: self.document.clone(),
            outline: self.outline.clone(),
            generated_markdown: self.generated_markdown.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_generator_core::{domain::BlockKind, ports::PlainTextOnly, OutlineError};
    use tempfile::TempDir;

    #[test]
    fn new_session_has_directory_and_outline() {
        let root = TempDir::new().unwrap();
        let id = Uuid::new_v4();
        let session = DraftSession::create(id, root.path()).unwrap();
        assert!(session.directory.is_dir());
        assert_eq!(session.directory, root.path().join(id.to_string()));
        // Both draft blocks are empty, so nothing is emitted yet.
        assert!(session.outline.sections.is_empty());
    }

    #[test]
    fn commands_regenerate_outline() {
        let root = TempDir::new().unwrap();
        let mut session = DraftSession::create(Uuid::new_v4(), root.path()).unwrap();
        let first = session.document.blocks[0].id;

        session
            .apply(EditCommand::UpdateHeading {
                block_id: first,
                heading: "Intro".into(),
            }, &PlainTextOnly)
            .unwrap();
        session
            .apply(EditCommand::UpdateContent {
                block_id: first,
                content: "Write intro".into(),
            }, &PlainTextOnly)
            .unwrap();

        assert_eq!(session.outline.sections.len(), 1);
        assert_eq!(session.outline.sections[0].prompt.as_deref(), Some("Write intro"));
    }

    #[test]
    fn edited_text_is_written_inside_session() {
        let root = TempDir::new().unwrap();
        let mut session = DraftSession::create(Uuid::new_v4(), root.path()).unwrap();
        let text = session.document.blocks[1].id;

        session
            .apply(EditCommand::UpdateContent {
                block_id: text,
                content: "Hello world".into(),
            }, &PlainTextOnly)
            .unwrap();

        let entry = &session.outline.resources[0];
        assert!(entry.is_inline);
        assert!(entry.path.starts_with(session.inline_dir()));
        assert_eq!(fs::read_to_string(&entry.path).unwrap(), "Hello world");
    }

    #[test]
    fn deleted_text_blocks_leave_no_inline_file_behind() {
        let root = TempDir::new().unwrap();
        let mut session = DraftSession::create(Uuid::new_v4(), root.path()).unwrap();
        let text = session.document.blocks[1].id;
        session
            .apply(EditCommand::UpdateContent {
                block_id: text,
                content: "Scratch notes".into(),
            }, &PlainTextOnly)
            .unwrap();
        let inline_file = session.outline.resources[0].path.clone();
        assert!(inline_file.is_file());

        // Files the session did not write are left alone.
        let unrelated = session.inline_dir().join("keep.md");
        fs::write(&unrelated, "mine").unwrap();

        session
            .apply(EditCommand::DeleteBlock { block_id: text }, &PlainTextOnly)
            .unwrap();
        assert!(session.outline.resources.is_empty());
        assert!(!inline_file.exists());
        assert!(unrelated.is_file());
    }

    #[test]
    fn failed_command_keeps_previous_state() {
        let root = TempDir::new().unwrap();
        let mut session = DraftSession::create(Uuid::new_v4(), root.path()).unwrap();
        session
            .apply(EditCommand::AddBlock {
                kind: BlockKind::Heading,
                after: None,
            }, &PlainTextOnly)
            .unwrap();
        let heading = session.document.blocks[2].id;
        let before = session.document.clone();

        let err = session
            .apply(EditCommand::ConvertBlock {
                block_id: heading,
                kind: BlockKind::Ai,
            }, &PlainTextOnly)
            .unwrap_err();
        assert!(matches!(err, OutlineError::InvalidBlockConversion));
        assert_eq!(session.document, before);
    }

    #[tokio::test]
    async fn store_tracks_sessions_by_id() {
        let root = TempDir::new().unwrap();
        let store = SessionStore::default();
        let id = Uuid::new_v4();
        store
            .insert(DraftSession::create(id, root.path()).unwrap())
            .await;

        assert!(store.get(id).await.is_some());
        assert!(store.get(Uuid::new_v4()).await.is_none());
        assert_eq!(store.len().await, 1);
        assert!(store.remove(id).await.is_some());
        assert!(store.is_empty().await);
    }
}
