use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// User-editable application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Selected capture device id (empty = default device)
    pub input_device_id: String,

    /// Selected playback device id (empty = default device)
    pub output_device_id: String,

    /// Directory where recordings and the session index are stored
    pub storage_directory: PathBuf,

    /// Start the transcription pipeline automatically when a recording stops
    pub auto_start_transcription: bool,

    /// Keep the original stereo capture after mono conversion
    pub save_raw_audio: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input_device_id: String::new(),
            output_device_id: String::new(),
            storage_directory: default_storage_dir(),
            auto_start_transcription: true,
            save_raw_audio: true,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("clinscribe")
        .join("recordings")
}

/// Settings persistence with an in-memory cached view.
///
/// The cached settings and the JSON file are updated together under a
/// single lock; readers always see the last saved state.
pub struct SettingsStore {
    file_path: PathBuf,
    cached: Mutex<Settings>,
}

impl SettingsStore {
    /// Open the settings store at `file_path`, loading existing settings
    /// or falling back to defaults when the file is absent or unreadable.
    pub fn open(file_path: impl Into<PathBuf>) -> Self {
        let file_path = file_path.into();
        let cached = match Self::load_from(&file_path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };

        Self {
            file_path,
            cached: Mutex::new(cached),
        }
    }

    /// Open the store at the platform default location
    /// (`<data dir>/clinscribe/settings.json`).
    pub fn open_default() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("clinscribe");
        Self::open(dir.join("settings.json"))
    }

    fn load_from(path: &Path) -> Result<Option<Settings>> {
        if !path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Snapshot of the current settings.
    pub fn get(&self) -> Settings {
        self.cached.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the settings, updating the cache and the file together.
    pub fn save(&self, settings: Settings) -> Result<()> {
        let mut cached = self.cached.lock().unwrap_or_else(|e| e.into_inner());
        *cached = settings.clone();

        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&settings)?;
        fs::write(&self.file_path, json)?;

        info!("Settings saved to {}", self.file_path.display());
        Ok(())
    }

    /// Create the storage directory if needed and return its path.
    pub fn ensure_storage_dir(&self) -> Result<PathBuf> {
        let dir = self.get().storage_directory;
        fs::create_dir_all(&dir)
            .map_err(|e| Error::StorageUnavailable(format!("{}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    /// Remove leftover mono conversion artifacts from the storage directory.
    pub fn clear_temporary_files(&self) -> Result<usize> {
        let dir = self.get().storage_directory;
        if !dir.is_dir() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if name.ends_with("_mono.wav") {
                if let Err(e) = fs::remove_file(&path) {
                    warn!("Failed to delete temporary file {}: {}", path.display(), e);
                } else {
                    info!("Deleted temporary file: {}", path.display());
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}
