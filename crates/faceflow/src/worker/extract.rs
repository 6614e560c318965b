//! The face extraction worker: builds the face catalog for a template.
//!
//! Extraction is a catalog maintenance task, not a user-facing job:
//! failures are logged and the descriptor is dropped. There is no job
//! row to move through a state machine.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::{error, info, warn};

use crate::db::{FaceTemplateRecord, TemplateRepository};
use crate::error::FaceflowError;
use crate::pipeline::{ExtractStageRequest, StageRunner};
use crate::queue::{JobDescriptor, TaskChannel};
use crate::storage::{CdnPaths, ObjectStore};

pub struct FaceExtractOrchestrator {
    channel: Arc<dyn TaskChannel>,
    channel_name: String,
    templates: TemplateRepository,
    runner: Arc<dyn StageRunner>,
    store: Arc<dyn ObjectStore>,
    paths: CdnPaths,
    faces_dir: PathBuf,
    frame_stride: usize,
}

impl FaceExtractOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: Arc<dyn TaskChannel>,
        channel_name: impl Into<String>,
        templates: TemplateRepository,
        runner: Arc<dyn StageRunner>,
        store: Arc<dyn ObjectStore>,
        paths: CdnPaths,
        faces_dir: PathBuf,
        frame_stride: usize,
    ) -> Self {
        Self {
            channel,
            channel_name: channel_name.into(),
            templates,
            runner,
            store,
            paths,
            faces_dir,
            frame_stride,
        }
    }

    pub fn run(&self, stop: &AtomicBool) {
        info!("Face worker listening on '{}'", self.channel_name);
        self.channel
            .listen(&self.channel_name, stop, &mut |descriptor| {
                self.handle(&descriptor)
            });
    }

    /// Extracts reference faces, publishes the crops and records them
    /// in the catalog.
    pub fn handle(&self, descriptor: &JobDescriptor) -> Result<(), FaceflowError> {
        let template_id = &descriptor.template_id;
        let output_dir = self.faces_dir.join(template_id);

        let count = self.runner.run_extract(&ExtractStageRequest {
            source_path: PathBuf::from(&descriptor.source_location),
            output_dir: output_dir.clone(),
            is_image: descriptor.is_image,
            frame_stride: self.frame_stride,
        })?;

        if count == 0 {
            warn!("Template {}: no faces found", template_id);
            return Ok(());
        }

        for index in 0..count {
            let crop = output_dir.join(format!("{}.png", index));
            let key = self.paths.face_key(template_id, index);
            self.store.upload(&crop, &key)?;

            match template_id.parse::<i64>() {
                Ok(id) => {
                    if let Err(e) = self.templates.insert_face(&FaceTemplateRecord {
                        template_id: id,
                        face_index: index as i64,
                        image_path: key.clone(),
                    }) {
                        error!(
                            "Template {}: face {} not recorded: {}",
                            template_id, index, e
                        );
                    }
                }
                Err(_) => warn!(
                    "Template id '{}' is not numeric, skipping catalog row",
                    template_id
                ),
            }
        }

        if let Ok(id) = template_id.parse::<i64>() {
            if let Err(e) = self.templates.set_face_count(id, count as i64) {
                error!("Template {}: face count not recorded: {}", template_id, e);
            }
        }

        info!("Template {}: {} faces cataloged", template_id, count);
        Ok(())
    }
}
