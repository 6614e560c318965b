//! Similarity policies for the two matching paths.
//!
//! The dedup path (reference extraction) and the swap matching path use
//! different metrics and thresholds that were tuned against different
//! embedding distributions. They are kept as two distinct named types so
//! their tuning can never accidentally couple.

use super::embedding::Embedding;

/// Squared-L2 policy for the extraction/dedup path.
///
/// Two embeddings within the threshold are considered the same visual
/// identity; the second observation is dropped rather than clustered.
#[derive(Debug, Clone, Copy)]
pub struct DedupPolicy {
    threshold: f32,
}

impl DedupPolicy {
    pub const DEFAULT_THRESHOLD: f32 = 0.6;

    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True when `probe` is close enough to `seen` to be the same
    /// identity. Strictly below the threshold counts; at or above does
    /// not.
    pub fn same_identity(&self, probe: &Embedding, seen: &Embedding) -> bool {
        probe.squared_l2(seen) < self.threshold
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

/// Cosine-distance policy for the swap matching path.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    threshold: f32,
}

impl MatchPolicy {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// True when a detected face qualifies for an assignment's source
    /// identity. Strictly below the threshold counts.
    pub fn qualifies(&self, probe: &Embedding, source: &Embedding) -> bool {
        probe.cosine_distance(source) < self.threshold
    }
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}
