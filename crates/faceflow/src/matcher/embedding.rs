//! Fixed-length face embedding vectors and their distance metrics.

/// A fixed-dimension floating-point vector representing a face's
/// appearance. Produced by the external embedding primitive; compared
/// here with either squared-L2 or cosine distance depending on the
/// calling policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Squared Euclidean distance. Used by the dedup/extraction path.
    ///
    /// Mismatched dimensions compare over the shorter prefix; callers
    /// are expected to feed embeddings from a single model, which are
    /// always the same dimension.
    pub fn squared_l2(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Cosine distance (`1 - cosine similarity`). Used by the swap
    /// matching path. A zero-norm vector has no direction; its distance
    /// to anything is defined as the maximum (1.0) so it never matches.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        let dot: f32 = self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum();
        let norm_a: f32 = self.0.iter().map(|a| a * a).sum::<f32>().sqrt();
        let norm_b: f32 = other.0.iter().map(|b| b * b).sum::<f32>().sqrt();

        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }

        1.0 - dot / (norm_a * norm_b)
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}
