//! Multi-pair swap matching for a single target frame.
//!
//! This is the quadratic core: faces × assignments, re-run
//! independently per frame with no cross-frame state. Recomputation is
//! traded for statelessness so frames can be processed in any order or
//! in parallel.

use crate::error::InferenceError;
use crate::inference::{Face, FaceAnalyzer, FaceSwapper, Frame};

use super::policy::MatchPolicy;

/// A caller-declared pairing: swap anything matching `source`'s
/// identity with `replacement`. Declaration order matters for
/// tie-breaks; position does not otherwise affect matching.
#[derive(Debug, Clone)]
pub struct SwapAssignment {
    /// The "from" identity. Its embedding is what detected faces are
    /// compared against.
    pub source: Face,
    /// The face painted over matching detections.
    pub replacement: Face,
}

/// Result of processing one frame.
#[derive(Debug)]
pub struct FrameSwapOutcome {
    pub frame: Frame,
    /// Faces detected in the frame.
    pub detected: usize,
    /// Faces that matched an assignment and were swapped.
    pub swapped: usize,
}

/// The first assignment, in declared order, whose source identity is
/// within the policy threshold of `probe`. First-match, not best-match:
/// a later assignment with a smaller distance does not win as long as
/// an earlier one qualifies.
pub fn first_match<'a>(
    probe: &Face,
    assignments: &'a [SwapAssignment],
    policy: &MatchPolicy,
) -> Option<&'a SwapAssignment> {
    assignments
        .iter()
        .find(|a| policy.qualifies(&probe.embedding, &a.source.embedding))
}

/// Applies the assignments to every detected face in `frame`. Faces
/// with no qualifying assignment pass through unmodified.
pub fn swap_frame(
    frame: &Frame,
    assignments: &[SwapAssignment],
    analyzer: &dyn FaceAnalyzer,
    swapper: &dyn FaceSwapper,
    policy: &MatchPolicy,
) -> Result<FrameSwapOutcome, InferenceError> {
    let faces = analyzer.detect_faces(frame)?;
    let detected = faces.len();
    let mut current = frame.clone();
    let mut swapped = 0usize;

    for face in &faces {
        if let Some(assignment) = first_match(face, assignments, policy) {
            current = swapper.swap_onto(&assignment.replacement, face, &current)?;
            swapped += 1;
        }
    }

    Ok(FrameSwapOutcome {
        frame: current,
        detected,
        swapped,
    })
}
