use hound::{WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use super::file::AudioFile;
use crate::error::{Error, Result};

/// Downmix a captured stereo file to the single-channel format the
/// transcription stage requires.
///
/// Produces a `<stem>_mono.wav` sibling next to the source: each output
/// sample is the average of the left and right channels at half amplitude
/// each, written as 16-bit PCM at the source sample rate. The source file
/// is never modified. A file that is already mono is copied through
/// unchanged.
pub fn convert_to_mono(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let audio = AudioFile::open(path)?;

    let mono_samples: Vec<i16> = match audio.channels {
        1 => audio.samples.clone(),
        2 => audio
            .samples
            .chunks_exact(2)
            .map(|frame| {
                let left = frame[0] as i32;
                let right = frame[1] as i32;
                ((left + right) / 2) as i16
            })
            .collect(),
        n => {
            return Err(Error::InvalidArgument(format!(
                "expected mono or stereo input, got {} channels",
                n
            )))
        }
    };

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("unusable file name: {}", path.display())))?;
    let mono_path = path.with_file_name(format!("{}_mono.wav", stem));

    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(&mono_path, spec)?;
    for sample in mono_samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    info!("Converted audio to mono: {}", mono_path.display());

    Ok(mono_path)
}
