use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceflowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors raised by the task queue channel.
///
/// `Unavailable` is the broker-unreachable case from the error taxonomy:
/// it is fatal to the individual publish/consume call and is only ever
/// retried at the listen-loop boundary, never mid-job.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Message broker unavailable: {0}")]
    Unavailable(#[from] rusqlite::Error),

    #[error("Failed to encode descriptor: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode descriptor: {0}")]
    Decode(#[source] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to upload '{key}': {source}")]
    Upload {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download '{key}': {source}")]
    Download {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the opaque inference collaborators (detection, embedding,
/// swap, enhancement) and from media decode on their behalf.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Face swap failed: {0}")]
    Swap(String),

    #[error("Enhancement failed: {0}")]
    Enhancement(String),

    #[error("Failed to decode media '{path}': {reason}")]
    MediaDecode { path: PathBuf, reason: String },

    #[error("No video codec available for '{path}'")]
    NoVideoCodec { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, FaceflowError>;
