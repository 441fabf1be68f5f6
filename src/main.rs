use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use clinscribe::{
    list_input_devices, list_output_devices, wav_duration, CaptureEngine, CaptureEvent,
    HttpPipelineClient, JsonSessionStore, Orchestrator, PipelineClient, PipelineConfig, Player,
    SessionStore, SettingsStore, TranscriptionSession,
};

#[derive(Parser)]
#[command(name = "clinscribe", about = "Clinical transcription note recorder")]
struct Cli {
    /// Pipeline config file name (searched as <name>.toml etc.)
    #[arg(long, default_value = "clinscribe")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List capture and playback devices
    Devices,
    /// Record a new session (p = pause, r = resume, s = stop and save)
    Record {
        /// Capture device id (defaults to the configured one)
        #[arg(long)]
        device: Option<String>,
        /// Do not start transcription after the recording stops
        #[arg(long)]
        no_transcribe: bool,
    },
    /// List saved sessions, newest first
    List,
    /// Show one session in full
    Show { id: String },
    /// Run the transcription pipeline for a session (Ctrl-C cancels)
    Process { id: String },
    /// Delete a session and securely destroy its audio files
    Delete { id: String },
    /// Play back a session's audio
    Play {
        id: String,
        /// Playback device id (defaults to the configured one)
        #[arg(long)]
        device: Option<String>,
    },
    /// Check that the remote pipeline is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let pipeline_config = PipelineConfig::load(&cli.config)?;
    let settings = Arc::new(SettingsStore::open_default());
    let storage_dir = settings.ensure_storage_dir()?;

    let store: Arc<dyn SessionStore> =
        Arc::new(JsonSessionStore::open(storage_dir.join("sessions.json"))?);
    let client = Arc::new(HttpPipelineClient::new(pipeline_config)?);
    let orchestrator = Orchestrator::new(Arc::clone(&store), client.clone());

    match cli.command {
        Command::Devices => {
            println!("Input devices:");
            for device in list_input_devices()? {
                println!(
                    "  [{}] {}{}",
                    device.id,
                    device.name,
                    if device.is_default { " (default)" } else { "" }
                );
            }
            println!("Output devices:");
            for device in list_output_devices()? {
                println!(
                    "  [{}] {}{}",
                    device.id,
                    device.name,
                    if device.is_default { " (default)" } else { "" }
                );
            }
        }

        Command::Record { device, no_transcribe } => {
            let current = settings.get();
            let device_id = device.unwrap_or_else(|| current.input_device_id.clone());

            let mut engine = CaptureEngine::new(Arc::clone(&settings));
            let mut events = engine.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    match event {
                        CaptureEvent::TimeUpdated(elapsed) => {
                            let secs = elapsed.as_secs();
                            eprint!("\r  recording {:02}:{:02}", secs / 60, secs % 60);
                        }
                        CaptureEvent::StatusChanged { recording, paused } => {
                            eprintln!(
                                "\n  status: {}",
                                match (recording, paused) {
                                    (true, true) => "paused",
                                    (true, false) => "recording",
                                    (false, _) => "stopped",
                                }
                            );
                        }
                    }
                }
            });

            engine.start_recording(&device_id)?;
            println!("Recording. Commands: p = pause, r = resume, s = stop");

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                match line.trim() {
                    "p" => engine.pause(),
                    "r" => engine.resume(),
                    "s" | "q" => break,
                    _ => println!("Commands: p = pause, r = resume, s = stop"),
                }
            }

            let Some(path) = engine.stop_and_save()? else {
                return Ok(());
            };
            let duration = wav_duration(&path)?;
            let session = orchestrator.create_session(path, duration).await?;
            println!("Saved session {} ({:.1}s)", session.id, session.duration_secs);

            if current.auto_start_transcription && !no_transcribe {
                let session = run_pipeline(&orchestrator, &session.id).await?;
                println!("\n{}", session.processed_text);
            }
        }

        Command::List => {
            for session in store.list_all().await? {
                println!(
                    "{}  {}  {:>7.1}s  {}{}",
                    session.id,
                    session.created_at.format("%Y-%m-%d %H:%M"),
                    session.duration_secs,
                    status_label(&session),
                    if session.audio_missing { "  [audio missing]" } else { "" },
                );
            }
        }

        Command::Show { id } => {
            let session = store
                .get_by_id(&id)
                .await?
                .context("session not found")?;
            println!("{:#?}", session);
        }

        Command::Process { id } => {
            let session = run_pipeline(&orchestrator, &id).await?;
            println!("{}", session.processed_text);
        }

        Command::Delete { id } => {
            let report = orchestrator.delete_session(&id).await?;
            if !report.found {
                println!("No session with id {}", id);
            } else if report.is_partial() {
                println!(
                    "Session deleted; {} file(s) could not be removed:",
                    report.failed_files.len()
                );
                for failure in &report.failed_files {
                    println!("  {}: {}", failure.path.display(), failure.detail);
                }
            } else {
                println!(
                    "Session deleted ({} files destroyed)",
                    report.deleted_files.len()
                );
            }
        }

        Command::Play { id, device } => {
            let session = store
                .get_by_id(&id)
                .await?
                .context("session not found")?;
            let current = settings.get();
            let device_id = device.unwrap_or_else(|| current.output_device_id.clone());

            let mut player = Player::new();
            player.play(&session.audio_file_path, &device_id)?;
            println!("Playing {}. Press Enter to stop.", session.title);

            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let _ = lines.next_line().await?;
            player.stop();
        }

        Command::Health => {
            let available = client.health_check().await;
            println!(
                "Pipeline API: {}",
                if available { "available" } else { "unavailable" }
            );
        }
    }

    Ok(())
}

/// Run the pipeline for one session with Ctrl-C wired to the cancellation
/// token.
async fn run_pipeline(orchestrator: &Orchestrator, id: &str) -> Result<TranscriptionSession> {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested");
            cancel.cancel();
        }
    });

    Ok(orchestrator.process_session(id, token).await?)
}

fn status_label(session: &TranscriptionSession) -> &'static str {
    if session.is_completed {
        "completed"
    } else if session.is_processing {
        "processing"
    } else if !session.raw_text.is_empty() {
        "transcribed"
    } else {
        "recorded"
    }
}
