pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod session;
pub mod settings;

pub use audio::{
    convert_to_mono, list_input_devices, list_output_devices, wav_duration, AudioDevice,
    AudioFile, CaptureClock, CaptureEngine, CaptureEvent, CaptureStatus, Player,
};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{
    DeleteReport, HttpPipelineClient, Orchestrator, PipelineClient, ProcessResponse,
    TranscribeResponse,
};
pub use session::{JsonSessionStore, SessionStore, TranscriptionSession};
pub use settings::{Settings, SettingsStore};
