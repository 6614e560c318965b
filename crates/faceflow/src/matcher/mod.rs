//! Identity matching: pure algorithms, no I/O.
//!
//! Two separate concerns live here, each with its own distance metric
//! and threshold. The thresholds are tuned independently; do not unify
//! them:
//!
//! - Reference extraction ([`ReferenceExtractor`]): deduplicates faces
//!   seen across frames into ordered identity clusters, using squared-L2
//!   distance.
//! - Swap matching ([`assign`]): decides, per detected face in a target
//!   frame, which caller-declared assignment applies, using cosine
//!   distance with a first-match tie-break.

pub mod assign;
pub mod cluster;
pub mod embedding;
pub mod policy;

pub use assign::{first_match, swap_frame, FrameSwapOutcome, SwapAssignment};
pub use cluster::{IdentityCluster, ReferenceExtractor, ReferenceFace};
pub use embedding::Embedding;
pub use policy::{DedupPolicy, MatchPolicy};
