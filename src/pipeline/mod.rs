//! The two-stage remote pipeline and its orchestration
//!
//! The client boundary talks to the remote transcription/processing API;
//! the orchestrator sequences convert → transcribe → process for one
//! session, persisting intermediate progress after every stage so partial
//! results survive failures.

mod client;
mod orchestrator;

pub use client::{HttpPipelineClient, PipelineClient, ProcessResponse, TranscribeResponse};
pub use orchestrator::{DeleteReport, FileDeleteFailure, Orchestrator};
