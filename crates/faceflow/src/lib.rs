pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod matcher;
pub mod pipeline;
pub mod producer;
pub mod queue;
pub mod storage;
pub mod worker;

pub use config::{load_config, Config};
pub use error::{
    ChannelError, ConfigError, FaceflowError, InferenceError, Result, StorageError,
};
pub use matcher::{DedupPolicy, Embedding, MatchPolicy, ReferenceExtractor, SwapAssignment};
pub use pipeline::{PipelineError, SwapPipeline};
pub use producer::Producer;
pub use queue::{JobDescriptor, SqliteChannel, TaskChannel};
