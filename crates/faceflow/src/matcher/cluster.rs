//! Reference identity extraction: deduplicating faces across frames.
//!
//! One pass over a sampled frame stream builds an ordered list of
//! identity clusters. Order is first-seen order and is significant:
//! position 0 is "the first unique identity encountered", and callers
//! index reference faces by that position.

use log::debug;

use crate::error::InferenceError;
use crate::inference::{FaceAnalyzer, Frame, FrameSource};

use super::embedding::Embedding;
use super::policy::DedupPolicy;

/// One deduplicated identity: the first-seen face crop kept as the
/// visual reference plus the embeddings attributed to this cluster.
/// Clusters are never merged once created; a processing run is
/// single-pass and short-lived.
#[derive(Debug, Clone)]
pub struct IdentityCluster {
    pub reference: Frame,
    pub embeddings: Vec<Embedding>,
}

impl IdentityCluster {
    fn founded_by(reference: Frame, embedding: Embedding) -> Self {
        Self {
            reference,
            embeddings: vec![embedding],
        }
    }

    /// Minimum squared-L2 distance from `probe` to any embedding in
    /// this cluster.
    fn min_distance(&self, probe: &Embedding) -> f32 {
        self.embeddings
            .iter()
            .map(|e| probe.squared_l2(e))
            .fold(f32::INFINITY, f32::min)
    }
}

/// A representative face for one extracted identity.
#[derive(Debug, Clone)]
pub struct ReferenceFace {
    /// Cropped face image, kept from the first observation.
    pub image: Frame,
    /// Founding embedding of the cluster.
    pub embedding: Embedding,
}

/// Extracts the deduplicated reference identities from a frame stream.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceExtractor {
    policy: DedupPolicy,
}

impl ReferenceExtractor {
    /// Frame sampling stride for single-result extraction.
    pub const SINGLE_RESULT_STRIDE: usize = 6;
    /// Frame sampling stride for the batch/archival variant.
    pub const ARCHIVAL_STRIDE: usize = 10;

    pub fn new(policy: DedupPolicy) -> Self {
        Self { policy }
    }

    /// Processes every `stride`-th frame of a video source. Frames are
    /// numbered from 1 and a frame is sampled when its number is a
    /// multiple of `stride`, so the first `stride - 1` frames are
    /// always skipped.
    pub fn extract_from_source(
        &self,
        source: &mut dyn FrameSource,
        stride: usize,
        analyzer: &dyn FaceAnalyzer,
    ) -> Result<Vec<ReferenceFace>, InferenceError> {
        let stride = stride.max(1);
        let mut clusters: Vec<IdentityCluster> = Vec::new();
        let mut number = 0usize;

        while let Some(frame) = source.next_frame()? {
            number += 1;
            if number % stride != 0 {
                continue;
            }
            self.absorb_frame(&frame, analyzer, &mut clusters)?;
        }

        debug!(
            "Reference extraction saw {} frames, kept {} identities",
            number,
            clusters.len()
        );

        Ok(Self::into_references(clusters))
    }

    /// Photo variant: processes the single frame, no sampling.
    pub fn extract_from_photo(
        &self,
        frame: &Frame,
        analyzer: &dyn FaceAnalyzer,
    ) -> Result<Vec<ReferenceFace>, InferenceError> {
        let mut clusters = Vec::new();
        self.absorb_frame(frame, analyzer, &mut clusters)?;
        Ok(Self::into_references(clusters))
    }

    fn absorb_frame(
        &self,
        frame: &Frame,
        analyzer: &dyn FaceAnalyzer,
        clusters: &mut Vec<IdentityCluster>,
    ) -> Result<(), InferenceError> {
        for face in analyzer.detect_faces(frame)? {
            // Compare against every embedding each cluster holds, not
            // just the founder.
            let already_seen = clusters
                .iter()
                .any(|c| c.min_distance(&face.embedding) < self.policy.threshold());

            if already_seen {
                continue;
            }

            let crop = face.bounds.crop(frame);
            clusters.push(IdentityCluster::founded_by(crop, face.embedding));
        }
        Ok(())
    }

    fn into_references(clusters: Vec<IdentityCluster>) -> Vec<ReferenceFace> {
        clusters
            .into_iter()
            .map(|mut c| ReferenceFace {
                image: c.reference,
                embedding: c.embeddings.remove(0),
            })
            .collect()
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new(DedupPolicy::default())
    }
}
