// Integration tests for the transcription orchestrator
//
// A mock pipeline client stands in for the remote API; the session store
// is the real JSON store in a temp directory, so every test also verifies
// what actually got persisted at each stage.

use anyhow::Result;
use async_trait::async_trait;
use clinscribe::{
    Error, JsonSessionStore, Orchestrator, PipelineClient, ProcessResponse, SessionStore,
    TranscribeResponse,
};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct MockPipeline {
    fail_transcribe: bool,
    fail_process: bool,
    hang_transcribe: bool,
    /// Cancelled right before transcribe returns, to exercise the
    /// checkpoint between the two stages
    cancel_after_transcribe: Option<CancellationToken>,
    transcribe_calls: AtomicUsize,
    process_calls: AtomicUsize,
}

#[async_trait]
impl PipelineClient for MockPipeline {
    async fn transcribe(&self, _audio_path: &Path) -> clinscribe::Result<TranscribeResponse> {
        self.transcribe_calls.fetch_add(1, Ordering::SeqCst);

        if self.hang_transcribe {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.fail_transcribe {
            return Err(Error::Unreachable("mock transcribe failure".to_string()));
        }
        if let Some(token) = &self.cancel_after_transcribe {
            token.cancel();
        }

        Ok(TranscribeResponse {
            text: "hello world".to_string(),
            confidence: Some(0.92),
            processing_time_ms: Some(40),
        })
    }

    async fn process(&self, _session_id: &str, _text: &str) -> clinscribe::Result<ProcessResponse> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_process {
            return Err(Error::BadResponse("mock process failure".to_string()));
        }

        Ok(ProcessResponse {
            processed_text: "Hello, World.".to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Write a small stereo capture so mono conversion has real input.
fn write_capture(path: &Path) -> Result<()> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: 44100,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for _ in 0..441 {
        writer.write_sample(500i16)?;
        writer.write_sample(-500i16)?;
    }
    writer.finalize()?;
    Ok(())
}

struct Fixture {
    _temp_dir: TempDir,
    audio_path: PathBuf,
    store: Arc<JsonSessionStore>,
}

fn fixture() -> Result<Fixture> {
    let temp_dir = TempDir::new()?;
    let audio_path = temp_dir.path().join("recording_20240101_120000.wav");
    write_capture(&audio_path)?;

    let store = Arc::new(JsonSessionStore::open(
        temp_dir.path().join("sessions.json"),
    )?);

    Ok(Fixture {
        _temp_dir: temp_dir,
        audio_path,
        store,
    })
}

fn orchestrator(fx: &Fixture, mock: &Arc<MockPipeline>) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(&fx.store) as Arc<dyn SessionStore>,
        Arc::clone(mock) as Arc<dyn PipelineClient>,
    )
}

#[tokio::test]
async fn test_create_session_rejects_bad_paths() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let empty = orch.create_session(PathBuf::new(), Duration::from_secs(1)).await;
    assert!(matches!(empty, Err(Error::InvalidArgument(_))));

    let missing = orch
        .create_session(PathBuf::from("/nonexistent/audio.wav"), Duration::from_secs(1))
        .await;
    assert!(matches!(missing, Err(Error::InvalidArgument(_))));

    Ok(())
}

#[tokio::test]
async fn test_create_session_persists_record() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs_f64(10.5))
        .await?;

    assert!(!session.id.is_empty());
    assert!(session.title.starts_with("Recording "));
    assert_eq!(session.duration_secs, 10.5);
    assert!(!session.is_processing);
    assert!(!session.is_completed);

    let stored = fx.store.get_by_id(&session.id).await?.expect("persisted");
    assert_eq!(stored, session);

    Ok(())
}

#[tokio::test]
async fn test_process_session_success() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;

    let processed = orch
        .process_session(&session.id, CancellationToken::new())
        .await?;

    assert_eq!(processed.raw_text, "hello world");
    assert_eq!(processed.processed_text, "Hello, World.");
    assert!(!processed.is_processing);
    assert!(processed.is_completed);
    assert_eq!(mock.transcribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(mock.process_calls.load(Ordering::SeqCst), 1);

    let stored = fx.store.get_by_id(&session.id).await?.expect("persisted");
    assert_eq!(stored, processed, "returned session must match the store");

    Ok(())
}

#[tokio::test]
async fn test_process_session_unknown_id() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let result = orch
        .process_session("no-such-session", CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_transcribe_failure_leaves_session_unchanged() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline {
        fail_transcribe: true,
        ..Default::default()
    });
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;
    let before = fx.store.get_by_id(&session.id).await?.expect("exists");

    let result = orch
        .process_session(&session.id, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::Unreachable(_))));

    let after = fx.store.get_by_id(&session.id).await?.expect("still exists");
    assert_eq!(
        after, before,
        "a failed transcribe must leave the record as it was, with the \
         processing flag back at its prior value"
    );
    assert!(after.raw_text.is_empty());
    assert!(!after.is_processing);

    Ok(())
}

#[tokio::test]
async fn test_process_failure_retains_raw_text() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline {
        fail_process: true,
        ..Default::default()
    });
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;

    let result = orch
        .process_session(&session.id, CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::BadResponse(_))));

    let stored = fx.store.get_by_id(&session.id).await?.expect("exists");
    assert_eq!(
        stored.raw_text, "hello world",
        "stage-1 output must survive a stage-2 failure"
    );
    assert!(stored.processed_text.is_empty());
    assert!(!stored.is_processing);
    assert!(!stored.is_completed);

    Ok(())
}

#[tokio::test]
async fn test_cancellation_between_stages() -> Result<()> {
    let fx = fixture()?;
    let token = CancellationToken::new();
    let mock = Arc::new(MockPipeline {
        cancel_after_transcribe: Some(token.clone()),
        ..Default::default()
    });
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;

    let result = orch.process_session(&session.id, token).await;
    assert!(matches!(result, Err(Error::Cancelled)));

    let stored = fx.store.get_by_id(&session.id).await?.expect("exists");
    assert_eq!(
        stored.raw_text, "hello world",
        "transcription completed before the cancel and must be persisted"
    );
    assert!(stored.processed_text.is_empty(), "stage 2 must not have run");
    assert!(!stored.is_processing);
    assert!(!stored.is_completed);
    assert_eq!(
        mock.process_calls.load(Ordering::SeqCst),
        0,
        "the process stage must never be invoked after a cancel"
    );

    Ok(())
}

#[tokio::test]
async fn test_duplicate_process_is_rejected_busy() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline {
        hang_transcribe: true,
        ..Default::default()
    });
    let orch = Arc::new(orchestrator(&fx, &mock));

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;

    let first_token = CancellationToken::new();
    let first = {
        let orch = Arc::clone(&orch);
        let id = session.id.clone();
        let token = first_token.clone();
        tokio::spawn(async move { orch.process_session(&id, token).await })
    };

    // Let the first call reach the hung transcribe stage
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = orch
        .process_session(&session.id, CancellationToken::new())
        .await;
    assert!(
        matches!(second, Err(Error::Busy(_))),
        "a concurrent process call for the same id must be rejected"
    );

    first_token.cancel();
    let first_result = first.await?;
    assert!(matches!(first_result, Err(Error::Cancelled)));

    // The id is released once the first call finishes
    let stored = fx.store.get_by_id(&session.id).await?.expect("exists");
    assert!(!stored.is_processing);

    Ok(())
}

#[tokio::test]
async fn test_delete_session_destroys_files_and_record() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let session = orch
        .create_session(fx.audio_path.clone(), Duration::from_secs(10))
        .await?;

    // Leave a conversion artifact next to the capture
    let mono_path = clinscribe::convert_to_mono(&fx.audio_path)?;
    assert!(mono_path.exists());

    let report = orch.delete_session(&session.id).await?;
    assert!(report.found);
    assert!(!report.is_partial(), "all file deletions should succeed");
    assert_eq!(report.deleted_files.len(), 2, "capture plus mono artifact");

    assert!(!fx.audio_path.exists(), "audio file must be gone");
    assert!(!mono_path.exists(), "mono sibling must be gone");
    assert!(fx.store.list_all().await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_delete_unknown_id_reports_not_found() -> Result<()> {
    let fx = fixture()?;
    let mock = Arc::new(MockPipeline::default());
    let orch = orchestrator(&fx, &mock);

    let report = orch.delete_session("no-such-session").await?;
    assert!(!report.found, "unknown ids report not-found without failing");
    assert!(report.deleted_files.is_empty());

    Ok(())
}
