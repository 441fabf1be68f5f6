use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A persisted recording-to-transcript session.
///
/// Created when a capture is stopped and saved, then carried through the
/// two-stage pipeline. Every stage transition is written back to the
/// session store before the next stage begins, so a crash mid-pipeline
/// leaves the record at the last completed stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionSession {
    /// Unique session identifier, assigned at creation
    pub id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Human label, user-editable
    pub title: String,

    /// Path to the captured audio file (referenced, not owned)
    pub audio_file_path: PathBuf,

    /// Recording duration net of pauses, in seconds
    pub duration_secs: f64,

    /// Transcription-stage output, empty until stage 1 completes
    pub raw_text: String,

    /// Post-processing-stage output, empty until stage 2 completes
    pub processed_text: String,

    /// True strictly between pipeline start and completion/failure
    pub is_processing: bool,

    /// True only after both stages succeed
    pub is_completed: bool,

    /// Free-form patient reference
    pub patient_id: String,

    /// Free-form notes
    pub notes: String,

    /// Set on load when `audio_file_path` no longer resolves on disk.
    /// Such records are flagged rather than dropped from listings.
    #[serde(default, skip_serializing)]
    pub audio_missing: bool,
}

impl TranscriptionSession {
    /// Build a fresh session for a completed capture.
    pub fn new(audio_file_path: PathBuf, duration_secs: f64) -> Self {
        let created_at = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at,
            title: format!("Recording {}", created_at.format("%Y-%m-%d %H:%M")),
            audio_file_path,
            duration_secs,
            raw_text: String::new(),
            processed_text: String::new(),
            is_processing: false,
            is_completed: false,
            patient_id: String::new(),
            notes: String::new(),
            audio_missing: false,
        }
    }
}
