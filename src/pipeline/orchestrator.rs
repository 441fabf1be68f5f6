use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::client::PipelineClient;
use crate::audio::convert_to_mono;
use crate::error::{Error, Result};
use crate::session::{secure_remove_file, SessionStore, TranscriptionSession};

/// One file that could not be destroyed during deletion.
#[derive(Debug)]
pub struct FileDeleteFailure {
    pub path: PathBuf,
    pub detail: String,
}

/// Outcome of a session deletion.
///
/// Deletion is best-effort: the store record is removed even when some
/// file deletions fail, and every per-file failure is reported here
/// instead of aborting the operation.
#[derive(Debug)]
pub struct DeleteReport {
    /// Whether a session with the requested id existed
    pub found: bool,
    pub deleted_files: Vec<PathBuf>,
    pub failed_files: Vec<FileDeleteFailure>,
}

impl DeleteReport {
    fn not_found() -> Self {
        Self {
            found: false,
            deleted_files: Vec::new(),
            failed_files: Vec::new(),
        }
    }

    /// Record removed but one or more files survived.
    pub fn is_partial(&self) -> bool {
        self.found && !self.failed_files.is_empty()
    }
}

/// Drives the recording-to-note pipeline for persisted sessions.
///
/// Sequences convert → transcribe → process, persisting after every step
/// so partial results survive failures, and owns session deletion.
/// At most one `process_session` may run per session id; duplicates are
/// rejected with `Busy`.
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    pipeline: Arc<dyn PipelineClient>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn SessionStore>, pipeline: Arc<dyn PipelineClient>) -> Self {
        Self {
            store,
            pipeline,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Register a completed capture as a new session.
    pub async fn create_session(
        &self,
        audio_path: PathBuf,
        duration: Duration,
    ) -> Result<TranscriptionSession> {
        if audio_path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument("audio path is empty".to_string()));
        }
        if !audio_path.exists() {
            return Err(Error::InvalidArgument(format!(
                "audio file does not exist: {}",
                audio_path.display()
            )));
        }

        let session = TranscriptionSession::new(audio_path, duration.as_secs_f64());
        self.store.upsert(&session).await?;

        info!("Created new session: {}", session.id);
        Ok(session)
    }

    /// Run the two-stage pipeline for `id`.
    ///
    /// Cancellation is cooperative: the token is checked at every
    /// checkpoint and the in-flight remote call is raced against it.
    /// On every exit path, success or not, `is_processing` is reset and
    /// persisted so the session never gets stuck mid-flight.
    pub async fn process_session(
        &self,
        id: &str,
        token: CancellationToken,
    ) -> Result<TranscriptionSession> {
        let _guard = self.claim(id)?;

        let mut session = self
            .store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        session.is_processing = true;
        self.store.upsert(&session).await?;

        // Conversion failures leave raw/processed text untouched; a retry
        // redoes the conversion and both remote calls.
        info!("Converting audio to mono: {}", session.audio_file_path.display());
        let mono_path = match convert_to_mono(&session.audio_file_path) {
            Ok(path) => path,
            Err(e) => return self.fail(session, e).await,
        };

        if token.is_cancelled() {
            return self.fail(session, Error::Cancelled).await;
        }

        info!("Sending audio for transcription: {}", session.id);
        let transcribed = tokio::select! {
            result = self.pipeline.transcribe(&mono_path) => result,
            _ = token.cancelled() => Err(Error::Cancelled),
        };
        let transcribed = match transcribed {
            Ok(result) => result,
            Err(e) => return self.fail(session, e).await,
        };

        session.raw_text = transcribed.text;
        self.store.upsert(&session).await?;

        if token.is_cancelled() {
            return self.fail(session, Error::Cancelled).await;
        }

        info!("Sending transcription for post-processing: {}", session.id);
        let processed = tokio::select! {
            result = self.pipeline.process(&session.id, &session.raw_text) => result,
            _ = token.cancelled() => Err(Error::Cancelled),
        };
        let processed = match processed {
            Ok(result) => result,
            Err(e) => return self.fail(session, e).await,
        };

        session.processed_text = processed.processed_text;
        session.is_processing = false;
        session.is_completed = true;
        self.store.upsert(&session).await?;

        info!("Completed processing session: {}", session.id);
        Ok(session)
    }

    /// Remove the session record and permanently destroy its audio file
    /// and every sibling sharing its base name (e.g. the mono conversion
    /// artifact). Files are overwritten with zeros before unlinking.
    pub async fn delete_session(&self, id: &str) -> Result<DeleteReport> {
        let Some(session) = self.store.get_by_id(id).await? else {
            return Ok(DeleteReport::not_found());
        };

        let mut report = DeleteReport {
            found: true,
            deleted_files: Vec::new(),
            failed_files: Vec::new(),
        };

        for path in session_files(&session) {
            match secure_remove_file(&path) {
                Ok(()) => {
                    info!("Securely deleted file: {}", path.display());
                    report.deleted_files.push(path);
                }
                Err(e) => {
                    error!("Failed to delete file {}: {}", path.display(), e);
                    report.failed_files.push(FileDeleteFailure {
                        path,
                        detail: e.to_string(),
                    });
                }
            }
        }

        // The record goes away regardless of per-file outcomes
        self.store.delete(id).await?;
        info!(
            "Deleted session {} ({} files removed, {} failed)",
            id,
            report.deleted_files.len(),
            report.failed_files.len()
        );

        Ok(report)
    }

    /// Reset the in-flight flag, persist, and propagate the failure.
    async fn fail(&self, mut session: TranscriptionSession, e: Error) -> Result<TranscriptionSession> {
        session.is_processing = false;
        if let Err(persist_err) = self.store.upsert(&session).await {
            error!(
                "Failed to persist processing-flag reset for {}: {}",
                session.id, persist_err
            );
        }

        warn!("Processing session {} failed: {}", session.id, e);
        Err(e)
    }

    fn claim(&self, id: &str) -> Result<InFlightGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(id.to_string()) {
            return Err(Error::Busy(id.to_string()));
        }

        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            id: id.to_string(),
        })
    }
}

/// Marks a session id as processing; releases it when dropped, on every
/// exit path.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        set.remove(&self.id);
    }
}

/// The session's audio file plus every existing sibling that shares its
/// base name (`<stem>.<ext>`, `<stem>_*`).
fn session_files(session: &TranscriptionSession) -> Vec<PathBuf> {
    let audio_path = &session.audio_file_path;
    if audio_path.as_os_str().is_empty() || session.audio_missing {
        return Vec::new();
    }

    let mut files = Vec::new();
    if audio_path.exists() {
        files.push(audio_path.clone());
    }

    let (Some(parent), Some(stem)) = (
        audio_path.parent(),
        audio_path.file_stem().and_then(|s| s.to_str()),
    ) else {
        return files;
    };

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) => {
            error!("Failed to scan {} for related files: {}", parent.display(), e);
            return files;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path == *audio_path {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with(&format!("{}_", stem)) || name.starts_with(&format!("{}.", stem)) {
            files.push(path);
        }
    }

    files
}
