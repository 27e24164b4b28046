//! Session storage
//!
//! The durable store maps a session id to its full record. Every write
//! replaces the whole record; there are no partial-field updates and no
//! conflict resolution (last write wins).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::core::{ChatError, ChatResult};

use super::session::ChatSession;

/// Default directory for session storage
const SESSIONS_DIR: &str = "sessions";

/// Extension of persisted session records
const RECORD_EXT: &str = "json";

/// Persistence backend for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Write the whole record, replacing any previous version
    async fn save(&self, session: &ChatSession) -> ChatResult<()>;

    /// Read one record, `None` if it does not exist
    async fn load(&self, id: &str) -> ChatResult<Option<ChatSession>>;

    /// Read every record
    async fn list(&self) -> ChatResult<Vec<ChatSession>>;

    /// Remove a record; removing a missing record is not an error
    async fn delete(&self, id: &str) -> ChatResult<()>;
}

/// Session store keeping one JSON file per session
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    /// Create a new store with the default directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from(SESSIONS_DIR),
        }
    }

    /// Create a new store with a custom directory
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: dir.into(),
        }
    }

    /// Get the record path for a session
    ///
    /// Returns `None` for ids that could escape the base directory.
    pub fn session_path(&self, session_id: &str) -> Option<PathBuf> {
        if !is_safe_id(session_id) {
            return None;
        }
        Some(self.base_dir.join(format!("{}.{}", session_id, RECORD_EXT)))
    }

    /// Get the base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    async fn read_record(path: &Path) -> ChatResult<ChatSession> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl Default for FileSessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn save(&self, session: &ChatSession) -> ChatResult<()> {
        let path = self
            .session_path(&session.id)
            .ok_or_else(|| ChatError::other(format!("invalid session id: {}", session.id)))?;
        fs::create_dir_all(&self.base_dir).await?;

        // Write beside the target, then rename over it
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session)?;
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(session_id = %session.id, messages = session.messages.len(), "Saved session");
        Ok(())
    }

    async fn load(&self, id: &str) -> ChatResult<Option<ChatSession>> {
        let Some(path) = self.session_path(id) else {
            return Ok(None);
        };
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read_record(&path).await.map(Some)
    }

    async fn list(&self) -> ChatResult<Vec<ChatSession>> {
        if !fs::try_exists(&self.base_dir).await? {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable session record");
                }
            }
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn delete(&self, id: &str) -> ChatResult<()> {
        let Some(path) = self.session_path(id) else {
            return Ok(());
        };
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory session store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<BTreeMap<String, ChatSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &ChatSession) -> ChatResult<()> {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> ChatResult<Option<ChatSession>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list(&self) -> ChatResult<Vec<ChatSession>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &str) -> ChatResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
