//! The swap pipeline: fetch, swap, enhance, watermark, deliver.
//!
//! Each step consumes the previous step's file and produces the next.
//! The pipeline itself never touches the job record; the orchestrator
//! owns status bookkeeping and decides what to do with a
//! [`PipelineError`].

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use tracing::info_span;

use crate::inference::VideoCodec;
use crate::queue::JobDescriptor;
use crate::storage::{CdnPaths, ObjectStore, TemplateCache};

use super::error::PipelineError;
use super::stage::{
    collect_face_pairs, EnhanceStageRequest, FacePairPaths, StageRunner, SwapStageRequest,
};
use super::watermark::Watermark;

/// What the pipeline delivered for a job.
#[derive(Debug)]
pub struct SwapReport {
    /// Storage key of the uploaded result.
    pub result_key: String,
    /// True when no usable face pair was supplied and the unmodified
    /// original was delivered instead. This is a successful outcome.
    pub no_face_pairs: bool,
}

pub struct SwapPipeline {
    store: Arc<dyn ObjectStore>,
    runner: Arc<dyn StageRunner>,
    cache: TemplateCache,
    paths: CdnPaths,
    work_dir: PathBuf,
    watermark: Option<Watermark>,
    codec: Option<Arc<dyn VideoCodec>>,
    enhancement_enabled: bool,
}

impl SwapPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn StageRunner>,
        cache: TemplateCache,
        paths: CdnPaths,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            runner,
            cache,
            paths,
            work_dir,
            watermark: None,
            codec: None,
            enhancement_enabled: false,
        }
    }

    pub fn with_watermark(mut self, watermark: Watermark) -> Self {
        self.watermark = Some(watermark);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn VideoCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_enhancement(mut self, enabled: bool) -> Self {
        self.enhancement_enabled = enabled;
        self
    }

    /// Runs the full pipeline for one job.
    pub fn run(&self, descriptor: &JobDescriptor) -> Result<SwapReport, PipelineError> {
        let _span = info_span!("swap_job", job_id = %descriptor.job_id).entered();

        let template = self.step_fetch_template(descriptor)?;
        let pairs = self.step_collect_pairs(descriptor)?;

        let result_key = self
            .paths
            .result_key(&descriptor.job_id, &descriptor.source_extension);

        if pairs.is_empty() {
            // Nothing to swap: the unmodified original is the result.
            info!(
                "Job {} has no face pairs, delivering original",
                descriptor.job_id
            );
            self.store.upload(&template, &result_key)?;
            return Ok(SwapReport {
                result_key,
                no_face_pairs: true,
            });
        }

        let output = self.step_swap_and_enhance(descriptor, &template, pairs)?;
        self.step_watermark(descriptor, &output)?;
        self.store.upload(&output, &result_key)?;

        if let Err(e) = fs::remove_file(&output) {
            warn!("Could not remove work file {}: {}", output.display(), e);
        }

        Ok(SwapReport {
            result_key,
            no_face_pairs: false,
        })
    }

    /// Delivers the unmodified original under the job's result key.
    /// Used by the orchestrator after a pipeline failure so the user
    /// gets something back rather than a dead link.
    pub fn fallback_upload(&self, descriptor: &JobDescriptor) -> Result<String, PipelineError> {
        let template = self.step_fetch_template(descriptor)?;
        let result_key = self
            .paths
            .result_key(&descriptor.job_id, &descriptor.source_extension);
        self.store.upload(&template, &result_key)?;
        Ok(result_key)
    }

    fn step_fetch_template(&self, descriptor: &JobDescriptor) -> Result<PathBuf, PipelineError> {
        let key = if descriptor.source_location.is_empty() {
            self.paths
                .source_key(&descriptor.template_id, &descriptor.source_extension)
        } else {
            descriptor.source_location.clone()
        };
        Ok(self.cache.ensure_local(
            self.store.as_ref(),
            &key,
            &descriptor.template_id,
            &descriptor.source_extension,
        )?)
    }

    fn step_collect_pairs(
        &self,
        descriptor: &JobDescriptor,
    ) -> Result<Vec<FacePairPaths>, PipelineError> {
        match &descriptor.face_pairs_dir {
            Some(dir) => collect_face_pairs(dir),
            None => Ok(Vec::new()),
        }
    }

    fn step_swap_and_enhance(
        &self,
        descriptor: &JobDescriptor,
        template: &PathBuf,
        pairs: Vec<FacePairPaths>,
    ) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.work_dir).map_err(|e| PipelineError::Io {
            path: self.work_dir.clone(),
            source: e,
        })?;

        let final_path = self.work_dir.join(format!(
            "{}{}",
            descriptor.job_id, descriptor.source_extension
        ));

        // Enhancement is a photo-only stage: video jobs always take
        // the direct swap path regardless of worker configuration.
        if !self.enhancement_enabled || !descriptor.is_image {
            self.runner.run_swap(&SwapStageRequest {
                face_pairs: pairs,
                target_path: template.clone(),
                output_path: final_path.clone(),
                is_image: descriptor.is_image,
            })?;
            return Ok(final_path);
        }

        let intermediate = self.work_dir.join(format!(
            "{}_temp{}",
            descriptor.template_id, descriptor.source_extension
        ));

        self.runner.run_swap(&SwapStageRequest {
            face_pairs: pairs,
            target_path: template.clone(),
            output_path: intermediate.clone(),
            is_image: descriptor.is_image,
        })?;

        self.runner.run_enhance(&EnhanceStageRequest {
            input_path: intermediate.clone(),
            output_path: final_path.clone(),
            is_image: descriptor.is_image,
        })?;

        if let Err(e) = fs::remove_file(&intermediate) {
            warn!(
                "Could not remove intermediate {}: {}",
                intermediate.display(),
                e
            );
        }

        Ok(final_path)
    }

    fn step_watermark(
        &self,
        descriptor: &JobDescriptor,
        output: &PathBuf,
    ) -> Result<(), PipelineError> {
        if !descriptor.watermark {
            return Ok(());
        }
        let Some(watermark) = &self.watermark else {
            warn!(
                "Job {} requested a watermark but none is configured",
                descriptor.job_id
            );
            return Ok(());
        };

        if descriptor.is_image {
            watermark.stamp_photo_file(output)
        } else {
            let codec = self.codec.as_deref().ok_or_else(|| {
                PipelineError::Inference(crate::error::InferenceError::NoVideoCodec {
                    path: output.clone(),
                })
            })?;
            watermark.stamp_video_file(output, codec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::inference::{load_frame, Face, FaceAnalyzer, FaceBox, FaceSwapper, Frame};
    use crate::matcher::Embedding;
    use crate::pipeline::stage::InProcessRunner;
    use crate::storage::FsObjectStore;
    use image::Rgba;
    use std::path::Path;

    struct OneFaceAnalyzer;

    impl FaceAnalyzer for OneFaceAnalyzer {
        fn detect_faces(&self, _frame: &Frame) -> Result<Vec<Face>, InferenceError> {
            Ok(vec![Face {
                bounds: FaceBox {
                    x: 0,
                    y: 0,
                    width: 1,
                    height: 1,
                },
                embedding: Embedding::new(vec![1.0, 0.0]),
            }])
        }
    }

    struct PaintingSwapper;

    impl FaceSwapper for PaintingSwapper {
        fn swap_onto(
            &self,
            _source: &Face,
            _target: &Face,
            frame: &Frame,
        ) -> Result<Frame, InferenceError> {
            let mut out = frame.clone();
            out.put_pixel(0, 0, Rgba([9, 9, 9, 255]));
            Ok(out)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<FsObjectStore>,
        store_root: PathBuf,
        work: PathBuf,
        pairs_dir: PathBuf,
    }

    fn paths() -> CdnPaths {
        CdnPaths {
            public_base: "https://cdn.test".to_string(),
            results_prefix: "results".to_string(),
            sources_prefix: "sources".to_string(),
            faces_prefix: "faces".to_string(),
        }
    }

    fn write_png(path: &Path, color: [u8; 4]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        Frame::from_pixel(64, 64, Rgba(color)).save(path).unwrap();
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store_root = dir.path().join("store");
        let store = Arc::new(FsObjectStore::new(&store_root));

        // Publish the template source.
        let template = dir.path().join("template.png");
        write_png(&template, [200, 200, 200, 255]);
        store.upload(&template, "sources/7.png").unwrap();

        // Pair images.
        let pairs_dir = dir.path().join("pairs");
        write_png(&pairs_dir.join("from_face/0.png"), [10, 10, 10, 255]);
        write_png(&pairs_dir.join("to_face/0.png"), [20, 20, 20, 255]);

        Fixture {
            store,
            store_root,
            work: dir.path().join("work"),
            pairs_dir,
            _dir: dir,
        }
    }

    fn pipeline(f: &Fixture) -> SwapPipeline {
        let runner = InProcessRunner::new(Arc::new(OneFaceAnalyzer), Arc::new(PaintingSwapper));
        SwapPipeline::new(
            f.store.clone(),
            Arc::new(runner),
            TemplateCache::new(f.work.join("cache")),
            paths(),
            f.work.clone(),
        )
    }

    fn descriptor(f: &Fixture, with_pairs: bool) -> JobDescriptor {
        JobDescriptor {
            job_id: "j1".to_string(),
            template_id: "7".to_string(),
            action_type: crate::queue::ActionType::Swap,
            source_location: "sources/7.png".to_string(),
            watermark: false,
            created_at_epoch: 0,
            is_image: true,
            source_extension: ".png".to_string(),
            face_pairs_dir: with_pairs.then(|| f.pairs_dir.clone()),
        }
    }

    #[test]
    fn test_zero_pairs_delivers_original() {
        let f = fixture();
        let report = pipeline(&f).run(&descriptor(&f, false)).unwrap();

        assert!(report.no_face_pairs);
        assert_eq!(report.result_key, "results/j1.png");

        let delivered = load_frame(&f.store_root.join("results/j1.png")).unwrap();
        assert_eq!(delivered.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn test_swap_result_is_uploaded() {
        let f = fixture();
        let report = pipeline(&f).run(&descriptor(&f, true)).unwrap();

        assert!(!report.no_face_pairs);
        let delivered = load_frame(&f.store_root.join("results/j1.png")).unwrap();
        // The swapper's marker pixel proves the swapped file, not the
        // original, was delivered.
        assert_eq!(delivered.get_pixel(0, 0), &Rgba([9, 9, 9, 255]));
    }

    #[test]
    fn test_watermark_applied_when_requested() {
        let f = fixture();
        let wm = Watermark::from_frame(Frame::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        let pipeline = pipeline(&f).with_watermark(wm);

        let mut d = descriptor(&f, true);
        d.watermark = true;
        pipeline.run(&d).unwrap();

        let delivered = load_frame(&f.store_root.join("results/j1.png")).unwrap();
        assert_eq!(delivered.get_pixel(25, 25), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_no_watermark_when_flag_off() {
        let f = fixture();
        let wm = Watermark::from_frame(Frame::from_pixel(4, 4, Rgba([0, 0, 255, 255])));
        let pipeline = pipeline(&f).with_watermark(wm);

        pipeline.run(&descriptor(&f, true)).unwrap();

        let delivered = load_frame(&f.store_root.join("results/j1.png")).unwrap();
        assert_ne!(delivered.get_pixel(25, 25), &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn test_enhancement_intermediate_is_removed() {
        let f = fixture();
        let pipeline = pipeline(&f).with_enhancement(true);
        pipeline.run(&descriptor(&f, true)).unwrap();

        assert!(!f.work.join("7_temp.png").exists());
        assert!(f.store_root.join("results/j1.png").is_file());
    }

    struct RecordingRunner {
        enhance_called: std::sync::atomic::AtomicBool,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                enhance_called: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }

    impl StageRunner for RecordingRunner {
        fn run_swap(&self, r: &SwapStageRequest) -> Result<(), PipelineError> {
            fs::copy(&r.target_path, &r.output_path).map_err(|e| PipelineError::Io {
                path: r.output_path.clone(),
                source: e,
            })?;
            Ok(())
        }
        fn run_enhance(&self, r: &EnhanceStageRequest) -> Result<(), PipelineError> {
            self.enhance_called
                .store(true, std::sync::atomic::Ordering::SeqCst);
            fs::copy(&r.input_path, &r.output_path).map_err(|e| PipelineError::Io {
                path: r.output_path.clone(),
                source: e,
            })?;
            Ok(())
        }
        fn run_extract(
            &self,
            _r: &super::super::stage::ExtractStageRequest,
        ) -> Result<usize, PipelineError> {
            unreachable!()
        }
    }

    #[test]
    fn test_enhancement_never_runs_for_video() {
        let f = fixture();
        let runner = Arc::new(RecordingRunner::new());
        let pipeline = SwapPipeline::new(
            f.store.clone(),
            runner.clone(),
            TemplateCache::new(f.work.join("cache")),
            paths(),
            f.work.clone(),
        )
        .with_enhancement(true);

        let mut d = descriptor(&f, true);
        d.is_image = false;
        d.source_extension = ".mp4".to_string();
        pipeline.run(&d).unwrap();

        assert!(!runner
            .enhance_called
            .load(std::sync::atomic::Ordering::SeqCst));
        assert!(f.store_root.join("results/j1.mp4").is_file());
    }

    #[test]
    fn test_enhancement_runs_for_photo() {
        let f = fixture();
        let runner = Arc::new(RecordingRunner::new());
        let pipeline = SwapPipeline::new(
            f.store.clone(),
            runner.clone(),
            TemplateCache::new(f.work.join("cache")),
            paths(),
            f.work.clone(),
        )
        .with_enhancement(true);

        pipeline.run(&descriptor(&f, true)).unwrap();

        assert!(runner
            .enhance_called
            .load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn test_stage_failure_propagates() {
        struct FailingRunner;
        impl StageRunner for FailingRunner {
            fn run_swap(&self, _r: &SwapStageRequest) -> Result<(), PipelineError> {
                Err(PipelineError::StageFailed {
                    stage: "swap".to_string(),
                    code: 137,
                })
            }
            fn run_enhance(&self, _r: &EnhanceStageRequest) -> Result<(), PipelineError> {
                unreachable!()
            }
            fn run_extract(
                &self,
                _r: &super::super::stage::ExtractStageRequest,
            ) -> Result<usize, PipelineError> {
                unreachable!()
            }
        }

        let f = fixture();
        let pipeline = SwapPipeline::new(
            f.store.clone(),
            Arc::new(FailingRunner),
            TemplateCache::new(f.work.join("cache")),
            paths(),
            f.work.clone(),
        );

        let err = pipeline.run(&descriptor(&f, true)).unwrap_err();
        assert!(matches!(err, PipelineError::StageFailed { code: 137, .. }));

        // The fallback path still delivers the original.
        let key = pipeline.fallback_upload(&descriptor(&f, true)).unwrap();
        assert_eq!(key, "results/j1.png");
        let delivered = load_frame(&f.store_root.join("results/j1.png")).unwrap();
        assert_eq!(delivered.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));
    }
}
