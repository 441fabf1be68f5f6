// Integration tests for the JSON session store
//
// The store keeps its in-memory cache and the backing file as one unit;
// these tests verify upsert semantics, ordering, missing-audio flagging
// and durability across reopen.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use clinscribe::{JsonSessionStore, SessionStore, TranscriptionSession};
use std::fs;
use tempfile::TempDir;

fn fixture_session(temp_dir: &TempDir, name: &str) -> Result<TranscriptionSession> {
    let audio_path = temp_dir.path().join(format!("{}.wav", name));
    fs::write(&audio_path, b"RIFF")?;
    Ok(TranscriptionSession::new(audio_path, 12.5))
}

#[tokio::test]
async fn test_upsert_and_get_round_trip() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonSessionStore::open(temp_dir.path().join("sessions.json"))?;

    let session = fixture_session(&temp_dir, "a")?;
    store.upsert(&session).await?;

    let loaded = store.get_by_id(&session.id).await?.expect("session should exist");
    assert_eq!(loaded, session);

    assert!(store.get_by_id("no-such-id").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_upsert_twice_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file_path = temp_dir.path().join("sessions.json");
    let store = JsonSessionStore::open(&file_path)?;

    let session = fixture_session(&temp_dir, "a")?;

    store.upsert(&session).await?;
    let after_first = fs::read_to_string(&file_path)?;
    let listed_first = store.list_all().await?;

    store.upsert(&session).await?;
    let after_second = fs::read_to_string(&file_path)?;
    let listed_second = store.list_all().await?;

    assert_eq!(after_first, after_second, "file state must be unchanged");
    assert_eq!(listed_first, listed_second, "listing must be unchanged");
    assert_eq!(listed_second.len(), 1, "no duplicate record may appear");

    Ok(())
}

#[tokio::test]
async fn test_upsert_replaces_in_place() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonSessionStore::open(temp_dir.path().join("sessions.json"))?;

    let mut session = fixture_session(&temp_dir, "a")?;
    store.upsert(&session).await?;

    session.raw_text = "hello world".to_string();
    session.title = "Renamed".to_string();
    store.upsert(&session).await?;

    let all = store.list_all().await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].raw_text, "hello world");
    assert_eq!(all[0].title, "Renamed");

    Ok(())
}

#[tokio::test]
async fn test_list_all_newest_first() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonSessionStore::open(temp_dir.path().join("sessions.json"))?;

    let mut oldest = fixture_session(&temp_dir, "oldest")?;
    oldest.created_at = Utc::now() - ChronoDuration::hours(2);
    let mut middle = fixture_session(&temp_dir, "middle")?;
    middle.created_at = Utc::now() - ChronoDuration::hours(1);
    let newest = fixture_session(&temp_dir, "newest")?;

    // Insert out of order
    store.upsert(&middle).await?;
    store.upsert(&newest).await?;
    store.upsert(&oldest).await?;

    let all = store.list_all().await?;
    let ids: Vec<&str> = all.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![newest.id.as_str(), middle.id.as_str(), oldest.id.as_str()],
        "sessions must be ordered newest-created first"
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_audio_is_flagged_not_dropped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonSessionStore::open(temp_dir.path().join("sessions.json"))?;

    let intact = fixture_session(&temp_dir, "intact")?;
    let orphaned =
        TranscriptionSession::new(temp_dir.path().join("vanished.wav"), 3.0);

    store.upsert(&intact).await?;
    store.upsert(&orphaned).await?;

    let all = store.list_all().await?;
    assert_eq!(all.len(), 2, "records with missing audio must stay listed");

    let flagged = all.iter().find(|s| s.id == orphaned.id).expect("orphaned listed");
    assert!(flagged.audio_missing, "missing audio file must be flagged");

    let unflagged = all.iter().find(|s| s.id == intact.id).expect("intact listed");
    assert!(!unflagged.audio_missing);

    Ok(())
}

#[tokio::test]
async fn test_delete() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let store = JsonSessionStore::open(temp_dir.path().join("sessions.json"))?;

    let session = fixture_session(&temp_dir, "a")?;
    store.upsert(&session).await?;

    assert!(store.delete(&session.id).await?, "existing id should delete");
    assert!(store.get_by_id(&session.id).await?.is_none());
    assert!(store.list_all().await?.is_empty());

    assert!(
        !store.delete(&session.id).await?,
        "deleting an unknown id should report false, not fail"
    );

    Ok(())
}

#[tokio::test]
async fn test_records_survive_reopen() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let file_path = temp_dir.path().join("sessions.json");

    let session = fixture_session(&temp_dir, "a")?;
    {
        let store = JsonSessionStore::open(&file_path)?;
        store.upsert(&session).await?;
    }

    let reopened = JsonSessionStore::open(&file_path)?;
    let loaded = reopened
        .get_by_id(&session.id)
        .await?
        .expect("session should survive reopen");
    assert_eq!(loaded, session);

    Ok(())
}
