use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        run_id: uuid::Uuid,
        id: String,
        total: usize,
        completed: usize,
        resuming: bool,
    },
    StepPlanned {
        index: usize,
        line: String,
    },
    PreflightFailed {
        index: usize,
        error: String,
    },
    StepStarted {
        index: usize,
        reexecute: bool,
    },
    StepCompleted {
        index: usize,
    },
    StepFailed {
        index: usize,
        error: String,
    },
    LockBroken {
        path: PathBuf,
    },
    RunPaused {
        run_id: uuid::Uuid,
        completed: usize,
        total: usize,
    },
    RunCompleted {
        run_id: uuid::Uuid,
        steps: usize,
    },
}
