//! Persisted session records and their durable store
//!
//! A `TranscriptionSession` is one recording-to-transcript lifecycle. The
//! store keeps all sessions in a single JSON file behind one lock; the
//! in-memory cache and the file are always updated together.

mod model;
mod store;

pub use model::TranscriptionSession;
pub use store::{secure_remove_file, JsonSessionStore, SessionStore};
