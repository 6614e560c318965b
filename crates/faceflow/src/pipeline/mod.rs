//! The media processing pipeline and its stage isolation layer.

pub mod error;
pub mod stage;
pub mod swap;
pub mod watermark;

pub use error::PipelineError;
pub use stage::{
    collect_face_pairs, EnhanceStageRequest, ExtractStageRequest, FacePairPaths, InProcessRunner,
    StageRunner, SubprocessRunner, SwapStageRequest,
};
pub use swap::{SwapPipeline, SwapReport};
pub use watermark::Watermark;
