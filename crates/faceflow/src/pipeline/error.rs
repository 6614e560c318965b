use std::path::PathBuf;
use thiserror::Error;

use crate::error::{InferenceError, StorageError};

/// Failure of any stage of the swap pipeline. Every variant is fatal to
/// the job being processed: the orchestrator records the error outcome
/// and falls back to delivering the unmodified original.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Stage '{stage}' exited with code {code}")]
    StageFailed { stage: String, code: i32 },

    #[error("Failed to spawn stage '{stage}': {source}")]
    StageSpawn {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Face pair directory '{path}' is unusable: {reason}")]
    FacePairs { path: PathBuf, reason: String },
}
