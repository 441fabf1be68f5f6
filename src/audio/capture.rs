use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use hound::{WavSpec, WavWriter};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{error, info};

use super::device;
use crate::error::{Error, Result};
use crate::settings::SettingsStore;

/// Cadence of the elapsed-time tick while recording.
const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Capacity of the event channel; slow subscribers lag rather than block
/// the timer thread.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Capture lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Recording,
    Paused,
}

/// Notification emitted by the capture engine.
///
/// Events are delivered on a broadcast channel, decoupling subscribers
/// from the engine's timer thread and internal locks.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// Recording started/stopped, or pause state changed. `recording`
    /// stays true across pause/resume; it only turns false on stop.
    StatusChanged { recording: bool, paused: bool },

    /// Net elapsed recording time, sampled once per tick while recording.
    TimeUpdated(Duration),
}

/// Elapsed-time accounting for one recording, net of pauses.
///
/// All methods take `now` explicitly, so arbitrary pause/resume
/// interleavings can be exercised without real time passing.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    started: Instant,
    paused_total: Duration,
    pause_started: Option<Instant>,
}

impl CaptureClock {
    pub fn start(now: Instant) -> Self {
        Self {
            started: now,
            paused_total: Duration::ZERO,
            pause_started: None,
        }
    }

    /// Begin a paused interval. No-op if already paused.
    pub fn pause(&mut self, now: Instant) {
        if self.pause_started.is_none() {
            self.pause_started = Some(now);
        }
    }

    /// End the current paused interval, folding it into the accumulated
    /// paused duration. No-op if not paused.
    pub fn resume(&mut self, now: Instant) {
        if let Some(pause_started) = self.pause_started.take() {
            self.paused_total += now.duration_since(pause_started);
        }
    }

    /// Wall-clock time since start minus all paused intervals, including
    /// an in-flight pause.
    pub fn elapsed(&self, now: Instant) -> Duration {
        let gross = now.duration_since(self.started);
        let paused = self.paused_total
            + self
                .pause_started
                .map(|p| now.duration_since(p))
                .unwrap_or(Duration::ZERO);
        gross.saturating_sub(paused)
    }

    pub fn is_paused(&self) -> bool {
        self.pause_started.is_some()
    }
}

/// Status and timestamps form one unit: the timer tick and the command
/// path both read and write them under this single lock, so neither can
/// observe a torn snapshot.
struct CaptureState {
    status: CaptureStatus,
    clock: Option<CaptureClock>,
    output_path: PathBuf,
    /// Bumped on every start so a leftover ticker from a previous
    /// recording can never attach to the new one.
    epoch: u64,
}

type SharedWriter = Arc<Mutex<Option<WavWriter<BufWriter<File>>>>>;

/// Owns the input audio stream, writes samples to a timestamp-named WAV
/// file, and tracks elapsed time net of pauses.
///
/// Pause gates writes off without tearing down the device stream; stop
/// halts the stream, finalizes the file and returns its path.
pub struct CaptureEngine {
    settings: Arc<SettingsStore>,
    state: Arc<Mutex<CaptureState>>,
    writer: SharedWriter,
    write_gate: Arc<AtomicBool>,
    events: broadcast::Sender<CaptureEvent>,
    stream: Option<cpal::Stream>,
}

impl CaptureEngine {
    pub fn new(settings: Arc<SettingsStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            settings,
            state: Arc::new(Mutex::new(CaptureState {
                status: CaptureStatus::Idle,
                clock: None,
                output_path: PathBuf::new(),
                epoch: 0,
            })),
            writer: Arc::new(Mutex::new(None)),
            write_gate: Arc::new(AtomicBool::new(false)),
            events,
            stream: None,
        }
    }

    /// Subscribe to status and elapsed-time notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> CaptureStatus {
        self.lock_state().status
    }

    /// Net elapsed time of the active recording, if any.
    pub fn elapsed(&self) -> Option<Duration> {
        let state = self.lock_state();
        state.clock.as_ref().map(|c| c.elapsed(Instant::now()))
    }

    /// Open the capture stream on `device_id` and begin writing to a fresh
    /// timestamp-named file in the storage directory. No-op when a
    /// recording is already active.
    pub fn start_recording(&mut self, device_id: &str) -> Result<()> {
        {
            let state = self.lock_state();
            if state.status != CaptureStatus::Idle {
                info!("Recording already active, ignoring start");
                return Ok(());
            }
        }

        let storage_dir = self.settings.ensure_storage_dir()?;

        let device = device::input_device_by_id(device_id)?;
        let stream_config = device
            .default_input_config()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        let filename = format!(
            "recording_{}.wav",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        );
        let output_path = storage_dir.join(&filename);

        let spec = WavSpec {
            channels: stream_config.channels(),
            sample_rate: stream_config.sample_rate().0,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let wav_writer = WavWriter::create(&output_path, spec)?;
        {
            let mut writer = self.lock_writer();
            *writer = Some(wav_writer);
        }
        self.write_gate.store(true, Ordering::SeqCst);

        let stream = match stream_config.sample_format() {
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&device, &stream_config.into()),
            cpal::SampleFormat::I32 => self.build_stream::<i32>(&device, &stream_config.into()),
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&device, &stream_config.into()),
            other => Err(Error::DeviceUnavailable(format!(
                "unsupported sample format: {:?}",
                other
            ))),
        };

        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                // Undo the half-open writer so the next start is clean
                self.write_gate.store(false, Ordering::SeqCst);
                let mut writer = self.lock_writer();
                *writer = None;
                return Err(e);
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;
        self.stream = Some(stream);

        let epoch = {
            let mut state = self.lock_state();
            state.status = CaptureStatus::Recording;
            state.clock = Some(CaptureClock::start(Instant::now()));
            state.output_path = output_path.clone();
            state.epoch += 1;
            state.epoch
        };

        self.spawn_ticker(epoch);

        let _ = self.events.send(CaptureEvent::StatusChanged {
            recording: true,
            paused: false,
        });
        info!("Started recording to {}", output_path.display());

        Ok(())
    }

    /// Gate writes off and freeze the elapsed-time clock. No-op unless
    /// currently recording.
    pub fn pause(&self) {
        let mut state = self.lock_state();
        if state.status != CaptureStatus::Recording {
            return;
        }

        if let Some(clock) = state.clock.as_mut() {
            clock.pause(Instant::now());
        }
        state.status = CaptureStatus::Paused;
        drop(state);

        self.write_gate.store(false, Ordering::SeqCst);
        let _ = self.events.send(CaptureEvent::StatusChanged {
            recording: true,
            paused: true,
        });
        info!("Recording paused");
    }

    /// Fold the paused interval into the clock and resume writes. No-op
    /// unless currently paused.
    pub fn resume(&self) {
        let mut state = self.lock_state();
        if state.status != CaptureStatus::Paused {
            return;
        }

        if let Some(clock) = state.clock.as_mut() {
            clock.resume(Instant::now());
        }
        state.status = CaptureStatus::Recording;
        drop(state);

        self.write_gate.store(true, Ordering::SeqCst);
        let _ = self.events.send(CaptureEvent::StatusChanged {
            recording: true,
            paused: false,
        });
        info!("Recording resumed");
    }

    /// Halt the capture stream, finalize the output file and return its
    /// path. Returns `None` (without side effects) when no recording is
    /// active, so a double stop is harmless.
    pub fn stop_and_save(&mut self) -> Result<Option<PathBuf>> {
        let output_path = {
            let mut state = self.lock_state();
            if state.status == CaptureStatus::Idle {
                return Ok(None);
            }

            // Final elapsed-time sample before the clock is discarded
            if let Some(clock) = state.clock.as_ref() {
                let _ = self
                    .events
                    .send(CaptureEvent::TimeUpdated(clock.elapsed(Instant::now())));
            }

            state.status = CaptureStatus::Idle;
            state.clock = None;
            std::mem::take(&mut state.output_path)
        };

        self.write_gate.store(false, Ordering::SeqCst);

        if let Some(stream) = self.stream.take() {
            stream.pause().ok();
            drop(stream);
        }

        let wav_writer = {
            let mut writer = self.lock_writer();
            writer.take()
        };
        if let Some(wav_writer) = wav_writer {
            wav_writer.finalize()?;
        }

        let _ = self.events.send(CaptureEvent::StatusChanged {
            recording: false,
            paused: false,
        });
        info!("Recording stopped. File saved to {}", output_path.display());

        Ok(Some(output_path))
    }

    fn build_stream<T>(
        &self,
        device: &cpal::Device,
        stream_config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: Sample + SizedSample,
        i16: FromSample<T>,
    {
        let writer = Arc::clone(&self.writer);
        let write_gate = Arc::clone(&self.write_gate);

        let state = Arc::clone(&self.state);
        let events = self.events.clone();
        let err_gate = Arc::clone(&self.write_gate);
        let err_fn = move |err: cpal::StreamError| {
            error!("Capture stream error: {}", err);

            // Device disconnect or write failure forces the session back
            // to Idle; the stream itself is already dead.
            err_gate.store(false, Ordering::SeqCst);
            let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.status != CaptureStatus::Idle {
                state.status = CaptureStatus::Idle;
                state.clock = None;
                drop(state);
                let _ = events.send(CaptureEvent::StatusChanged {
                    recording: false,
                    paused: false,
                });
            }
        };

        let stream = device
            .build_input_stream(
                stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    if !write_gate.load(Ordering::SeqCst) {
                        return;
                    }
                    let Ok(mut guard) = writer.lock() else {
                        return;
                    };
                    if let Some(w) = guard.as_mut() {
                        for &sample in data {
                            let sample_i16: i16 = sample.to_sample();
                            w.write_sample(sample_i16).ok();
                        }
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?;

        Ok(stream)
    }

    /// Spawn the 1 Hz elapsed-time ticker for the recording identified by
    /// `epoch`. The tick reads status and clock under the state lock and
    /// does nothing at all unless that exact recording is still active.
    fn spawn_ticker(&self, epoch: u64) {
        let state = Arc::clone(&self.state);
        let events = self.events.clone();

        thread::spawn(move || loop {
            thread::sleep(TICK_INTERVAL);

            let elapsed = {
                let state = state.lock().unwrap_or_else(PoisonError::into_inner);
                if state.epoch != epoch || state.status == CaptureStatus::Idle {
                    break;
                }
                if state.status == CaptureStatus::Paused {
                    continue;
                }
                state.clock.as_ref().map(|c| c.elapsed(Instant::now()))
            };

            if let Some(elapsed) = elapsed {
                let _ = events.send(CaptureEvent::TimeUpdated(elapsed));
            }
        });
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_writer(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<WavWriter<BufWriter<File>>>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.status() != CaptureStatus::Idle {
            if let Err(e) = self.stop_and_save() {
                error!("Failed to stop recording on shutdown: {}", e);
            }
        }
    }
}
