use async_trait::async_trait;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::model::TranscriptionSession;
use crate::error::Result;

/// Durable mapping from session id to session record.
///
/// Upsert by id is the only write primitive: there is no separate
/// create-vs-update path at the store level.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// All sessions, newest-created first. Records whose audio file no
    /// longer resolves on disk are flagged, not dropped.
    async fn list_all(&self) -> Result<Vec<TranscriptionSession>>;

    /// Look up one session by id.
    async fn get_by_id(&self, id: &str) -> Result<Option<TranscriptionSession>>;

    /// Insert if the id is unseen, else replace in place. The record is
    /// durably persisted before this returns.
    async fn upsert(&self, session: &TranscriptionSession) -> Result<()>;

    /// Remove a session record. Returns false for an unknown id.
    async fn delete(&self, id: &str) -> Result<bool>;
}

/// Session store backed by a single JSON file.
///
/// The in-memory cache and the on-disk file are one unit: both are updated
/// together under the same lock, serializing concurrent writers.
pub struct JsonSessionStore {
    file_path: PathBuf,
    sessions: Mutex<Vec<TranscriptionSession>>,
}

impl JsonSessionStore {
    /// Open (or create) the store file at `file_path`.
    pub fn open(file_path: impl Into<PathBuf>) -> Result<Self> {
        let file_path = file_path.into();

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let sessions = if file_path.exists() {
            let json = fs::read_to_string(&file_path)?;
            serde_json::from_str(&json)?
        } else {
            fs::write(&file_path, "[]")?;
            Vec::new()
        };

        Ok(Self {
            file_path,
            sessions: Mutex::new(sessions),
        })
    }

    /// Write the full session list back to disk. Called with the session
    /// lock held so cache and file never diverge.
    fn persist(&self, sessions: &[TranscriptionSession]) -> Result<()> {
        let json = serde_json::to_string_pretty(sessions)?;
        let mut file = File::create(&self.file_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(())
    }

    fn flag_missing_audio(session: &mut TranscriptionSession) {
        session.audio_missing =
            !session.audio_file_path.as_os_str().is_empty() && !session.audio_file_path.exists();
        if session.audio_missing {
            warn!(
                "Audio file not found for session {}: {}",
                session.id,
                session.audio_file_path.display()
            );
        }
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn list_all(&self) -> Result<Vec<TranscriptionSession>> {
        let sessions = self.sessions.lock().await;

        let mut listed: Vec<TranscriptionSession> = sessions.clone();
        for session in &mut listed {
            Self::flag_missing_audio(session);
        }

        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<TranscriptionSession>> {
        if id.is_empty() {
            return Ok(None);
        }

        let sessions = self.sessions.lock().await;
        let mut found = sessions.iter().find(|s| s.id == id).cloned();
        if let Some(session) = &mut found {
            Self::flag_missing_audio(session);
        }
        Ok(found)
    }

    async fn upsert(&self, session: &TranscriptionSession) -> Result<()> {
        let mut sessions = self.sessions.lock().await;

        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }

        self.persist(&sessions)?;
        info!("Saved session: {}", session.id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        sessions.retain(|s| s.id != id);
        if sessions.len() == before {
            return Ok(false);
        }

        self.persist(&sessions)?;
        info!("Deleted session record: {}", id);
        Ok(true)
    }
}

/// Overwrite a file's contents with zeros, then unlink it.
///
/// Used when erasing clinical audio: the payload must not survive in the
/// filesystem after deletion.
pub fn secure_remove_file(path: &Path) -> std::io::Result<()> {
    let length = fs::metadata(path)?.len();

    {
        let mut file = OpenOptions::new().write(true).open(path)?;
        let zeros = [0u8; 4096];
        let mut remaining = length;

        while remaining > 0 {
            let chunk = remaining.min(zeros.len() as u64) as usize;
            file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }

        file.flush()?;
        file.sync_all()?;
    }

    fs::remove_file(path)
}
