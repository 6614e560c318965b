//! Job submission: creates the job record and publishes the descriptor.
//!
//! The row is inserted before the descriptor is published so a worker
//! can never dequeue a job whose record does not exist yet.

use std::path::PathBuf;

use chrono::Utc;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{JobRecord, JobRepository, JobStatus};
use crate::error::Result;
use crate::queue::{ActionType, JobDescriptor, TaskChannel};

/// Parameters of a swap job submission.
#[derive(Debug, Clone)]
pub struct NewSwapJob {
    pub template_id: String,
    /// Storage key of the template source; empty means derive it from
    /// the template id.
    pub source_location: String,
    pub watermark: bool,
    pub is_image: bool,
    pub source_extension: String,
    pub face_pairs_dir: Option<PathBuf>,
    /// Marks the job as the first use of a freshly ingested template.
    pub is_new_template: bool,
    pub premium: bool,
}

pub struct Producer {
    channel: Arc<dyn TaskChannel>,
    jobs: JobRepository,
    swap_channel: String,
    faces_channel: String,
}

impl Producer {
    pub fn new(
        channel: Arc<dyn TaskChannel>,
        jobs: JobRepository,
        swap_channel: impl Into<String>,
        faces_channel: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            jobs,
            swap_channel: swap_channel.into(),
            faces_channel: faces_channel.into(),
        }
    }

    /// Submits a swap job. Returns the generated job id.
    pub fn submit(&self, job: NewSwapJob) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        self.jobs.insert(&JobRecord {
            job_id: job_id.clone(),
            status: JobStatus::Queued,
            server: None,
            template_id: job.template_id.clone(),
            decoded_image_path: None,
            source_path: None,
            thumb: None,
            preview_source: None,
            watermark: job.watermark,
            duration_seconds: None,
            is_image: job.is_image,
            is_new_template: job.is_new_template,
            premium: job.premium,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        })?;

        let descriptor = JobDescriptor {
            job_id: job_id.clone(),
            template_id: job.template_id,
            action_type: ActionType::Swap,
            source_location: job.source_location,
            watermark: job.watermark,
            created_at_epoch: now.timestamp(),
            is_image: job.is_image,
            source_extension: job.source_extension,
            face_pairs_dir: job.face_pairs_dir,
        };
        self.channel.publish(&self.swap_channel, &descriptor)?;

        info!("Submitted swap job {}", job_id);
        Ok(job_id)
    }

    /// Publishes a face extraction request for a template. Extraction
    /// has no job record; the descriptor id exists for log correlation.
    pub fn submit_extract(
        &self,
        template_id: impl Into<String>,
        source_location: impl Into<String>,
        is_image: bool,
        source_extension: impl Into<String>,
    ) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        let descriptor = JobDescriptor {
            job_id: job_id.clone(),
            template_id: template_id.into(),
            action_type: ActionType::ExtractFaces,
            source_location: source_location.into(),
            watermark: false,
            created_at_epoch: Utc::now().timestamp(),
            is_image,
            source_extension: source_extension.into(),
            face_pairs_dir: None,
        };
        self.channel.publish(&self.faces_channel, &descriptor)?;

        info!("Submitted extraction for template {}", descriptor.template_id);
        Ok(job_id)
    }

    /// Drains and returns every descriptor waiting on `channel`. The
    /// broker has no non-consuming peek, so this removes what it
    /// returns.
    pub fn poll_channel(&self, channel: &str) -> Result<Vec<JobDescriptor>> {
        Ok(self.channel.drain(channel)?)
    }
}
