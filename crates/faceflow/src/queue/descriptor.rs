//! The serialized payload describing one unit of work.
//!
//! Wire format is a flat JSON object with exactly these field names.
//! There is no version tag; schema evolution is additive-only, so every
//! field added after the initial shape must carry `#[serde(default)]`
//! and readers must ignore unknown fields (serde's default behaviour).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// What kind of work the descriptor requests. Each action type has its
/// own channel; a worker subscribes to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Swap,
    ExtractFaces,
}

/// Immutable message payload, published once and never mutated. The
/// `job_id` is globally unique and doubles as the primary key of the
/// corresponding job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub template_id: String,
    pub action_type: ActionType,
    /// Storage key (swap) or local path (extract) of the media to
    /// process.
    pub source_location: String,
    pub watermark: bool,
    /// Submission time, seconds since the epoch. Job duration is
    /// computed against this at completion.
    pub created_at_epoch: i64,
    pub is_image: bool,
    /// Extension of the template source, dot included (".mp4", ".png").
    pub source_extension: String,
    /// Swap only: directory holding `from_face/` and `to_face/`
    /// subdirectories with the decoded pair images.
    #[serde(default)]
    pub face_pairs_dir: Option<PathBuf>,
}

impl JobDescriptor {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}
