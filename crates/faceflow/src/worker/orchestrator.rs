//! The swap worker: consumes descriptors and owns job bookkeeping.
//!
//! All record store writes on this path go through the bounded-retry
//! `try_*` variants: a job must never be wedged by a flaky database,
//! and an abandoned write is logged rather than escalated.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use log::{error, info, warn};

use crate::db::{JobRepository, JobStatus};
use crate::pipeline::SwapPipeline;
use crate::queue::{JobDescriptor, TaskChannel};

pub struct SwapOrchestrator {
    channel: Arc<dyn TaskChannel>,
    channel_name: String,
    jobs: JobRepository,
    pipeline: SwapPipeline,
    server: Option<String>,
}

impl SwapOrchestrator {
    pub fn new(
        channel: Arc<dyn TaskChannel>,
        channel_name: impl Into<String>,
        jobs: JobRepository,
        pipeline: SwapPipeline,
    ) -> Self {
        Self {
            channel,
            channel_name: channel_name.into(),
            jobs,
            pipeline,
            server: None,
        }
    }

    /// Worker host identity recorded on every job this worker picks up.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Consumes the channel until `stop` is set.
    pub fn run(&self, stop: &AtomicBool) {
        info!("Swap worker listening on '{}'", self.channel_name);
        self.channel
            .listen(&self.channel_name, stop, &mut |descriptor| {
                self.handle(descriptor);
                Ok(())
            });
    }

    /// Processes one job end to end. Never returns an error: every
    /// outcome, success or failure, is recorded on the job row and the
    /// worker moves on.
    pub fn handle(&self, descriptor: JobDescriptor) {
        let job_id = descriptor.job_id.clone();

        // Visible progress before any processing: a watcher polling the
        // row sees in_work the moment the descriptor is dequeued.
        if self
            .jobs
            .try_update_status(&job_id, JobStatus::InWork)
            .is_none()
        {
            warn!("Job {}: could not record in_work, continuing", job_id);
        }
        if let Some(server) = &self.server {
            self.jobs.try_update_server(&job_id, server);
        }

        match self.pipeline.run(&descriptor) {
            Ok(report) => {
                info!(
                    "Job {} done, result at {} (no_face_pairs: {})",
                    job_id, report.result_key, report.no_face_pairs
                );
                self.record_outcome(&descriptor, JobStatus::Done, Some(&report.result_key));
            }
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                self.record_outcome(&descriptor, JobStatus::Error, None);
                // Deliver the unmodified original so the job's result
                // link is not dead.
                match self.pipeline.fallback_upload(&descriptor) {
                    Ok(key) => {
                        self.jobs.try_update_source(&job_id, &key);
                    }
                    Err(fe) => error!("Job {} fallback upload failed: {}", job_id, fe),
                }
            }
        }
    }

    /// Duration, then status, then source. Each write stands alone;
    /// a partially recorded outcome is preferred over none.
    fn record_outcome(
        &self,
        descriptor: &JobDescriptor,
        status: JobStatus,
        result_key: Option<&str>,
    ) {
        let duration = (Utc::now().timestamp() - descriptor.created_at_epoch).max(0);
        self.jobs.try_update_duration(&descriptor.job_id, duration);
        self.jobs.try_update_status(&descriptor.job_id, status);
        if let Some(key) = result_key {
            self.jobs.try_update_source(&descriptor.job_id, key);
        }
    }
}
