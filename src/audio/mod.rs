//! Audio capture, conversion and playback
//!
//! This module owns everything that touches sound:
//! - Device enumeration for the settings layer
//! - The capture engine (start/pause/resume/stop with pause-net timing)
//! - Stereo-to-mono conversion for the transcription stage
//! - Playback of saved recordings

pub mod capture;
pub mod convert;
pub mod device;
pub mod file;
pub mod playback;

pub use capture::{CaptureClock, CaptureEngine, CaptureEvent, CaptureStatus};
pub use convert::convert_to_mono;
pub use device::{list_input_devices, list_output_devices, AudioDevice};
pub use file::{wav_duration, AudioFile};
pub use playback::Player;
