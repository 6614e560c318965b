//! Long-running worker loops, one per action type.

pub mod extract;
pub mod orchestrator;

pub use extract::FaceExtractOrchestrator;
pub use orchestrator::SwapOrchestrator;
