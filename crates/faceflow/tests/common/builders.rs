//! Builder patterns for creating test data programmatically.

#![allow(dead_code)]

use std::path::PathBuf;

use chrono::Utc;
use faceflow::producer::NewSwapJob;
use faceflow::queue::{ActionType, JobDescriptor};

/// Builder for [`JobDescriptor`] values with sensible photo defaults.
pub struct DescriptorBuilder {
    descriptor: JobDescriptor,
}

impl DescriptorBuilder {
    pub fn new(job_id: &str) -> Self {
        Self {
            descriptor: JobDescriptor {
                job_id: job_id.to_string(),
                template_id: "7".to_string(),
                action_type: ActionType::Swap,
                source_location: "sources/7.png".to_string(),
                watermark: false,
                created_at_epoch: Utc::now().timestamp(),
                is_image: true,
                source_extension: ".png".to_string(),
                face_pairs_dir: None,
            },
        }
    }

    pub fn template_id(mut self, id: &str) -> Self {
        self.descriptor.template_id = id.to_string();
        self
    }

    pub fn action_type(mut self, action: ActionType) -> Self {
        self.descriptor.action_type = action;
        self
    }

    pub fn source_location(mut self, location: &str) -> Self {
        self.descriptor.source_location = location.to_string();
        self
    }

    pub fn watermark(mut self, enabled: bool) -> Self {
        self.descriptor.watermark = enabled;
        self
    }

    pub fn created_at_epoch(mut self, epoch: i64) -> Self {
        self.descriptor.created_at_epoch = epoch;
        self
    }

    pub fn video(mut self, extension: &str) -> Self {
        self.descriptor.is_image = false;
        self.descriptor.source_extension = extension.to_string();
        self
    }

    pub fn face_pairs_dir(mut self, dir: PathBuf) -> Self {
        self.descriptor.face_pairs_dir = Some(dir);
        self
    }

    pub fn build(self) -> JobDescriptor {
        self.descriptor
    }
}

/// Builder for [`NewSwapJob`] submissions.
pub struct SubmissionBuilder {
    job: NewSwapJob,
}

impl SubmissionBuilder {
    pub fn new() -> Self {
        Self {
            job: NewSwapJob {
                template_id: "7".to_string(),
                source_location: "sources/7.png".to_string(),
                watermark: false,
                is_image: true,
                source_extension: ".png".to_string(),
                face_pairs_dir: None,
                is_new_template: false,
                premium: false,
            },
        }
    }

    pub fn template_id(mut self, id: &str) -> Self {
        self.job.template_id = id.to_string();
        self
    }

    pub fn watermark(mut self, enabled: bool) -> Self {
        self.job.watermark = enabled;
        self
    }

    pub fn face_pairs_dir(mut self, dir: PathBuf) -> Self {
        self.job.face_pairs_dir = Some(dir);
        self
    }

    pub fn new_template(mut self, is_new: bool) -> Self {
        self.job.is_new_template = is_new;
        self
    }

    pub fn premium(mut self, premium: bool) -> Self {
        self.job.premium = premium;
        self
    }

    pub fn build(self) -> NewSwapJob {
        self.job
    }
}

impl Default for SubmissionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
