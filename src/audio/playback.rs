use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::info;

use super::device;
use super::file::AudioFile;
use crate::error::{Error, Result};

/// Playback of saved recordings.
///
/// At most one playback stream exists at a time: starting a new one
/// implicitly stops whatever was playing.
pub struct Player {
    stream: Option<cpal::Stream>,
}

impl Player {
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Decode `path` and start playing it on `device_id`.
    pub fn play(&mut self, path: impl AsRef<Path>, device_id: &str) -> Result<()> {
        self.stop();

        let audio = AudioFile::open(path.as_ref())?;
        let device = device::output_device_by_id(device_id)?;

        let default_config = device
            .default_output_config()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        let stream_config = cpal::StreamConfig {
            channels: audio.channels,
            sample_rate: cpal::SampleRate(audio.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let samples = Arc::new(audio.samples);
        let stream = match default_config.sample_format() {
            cpal::SampleFormat::I16 => {
                build_output_stream::<i16>(&device, &stream_config, samples)
            }
            cpal::SampleFormat::F32 => {
                build_output_stream::<f32>(&device, &stream_config, samples)
            }
            other => Err(Error::DeviceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            ))),
        }?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);

        info!("Playing audio file: {}", path.as_ref().display());
        Ok(())
    }

    /// Stop playback, if any.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            stream.pause().ok();
            drop(stream);
            info!("Audio playback stopped");
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

fn build_output_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    samples: Arc<Vec<i16>>,
) -> Result<cpal::Stream>
where
    T: Sample + SizedSample + FromSample<i16>,
{
    let position = AtomicUsize::new(0);
    let err_fn = |err: cpal::StreamError| {
        tracing::error!("Playback stream error: {}", err);
    };

    let stream = device
        .build_output_stream(
            stream_config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| {
                let start = position.fetch_add(output.len(), Ordering::SeqCst);
                for (i, slot) in output.iter_mut().enumerate() {
                    let sample = samples.get(start + i).copied().unwrap_or(0);
                    *slot = T::from_sample(sample);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}
