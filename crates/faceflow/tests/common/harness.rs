//! Test harness for isolated end-to-end execution.
//!
//! Every harness owns its own temporary directory holding the broker
//! file, the record store, the object store root and all scratch
//! directories, so tests can run in parallel without interference.
//! The ML collaborators are deterministic fakes: detection reads pixel
//! colours, the swapper paints a marker pixel.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::Rgba;
use tempfile::TempDir;

use faceflow::db::{Database, JobRepository, TemplateRepository};
use faceflow::error::InferenceError;
use faceflow::inference::{Face, FaceAnalyzer, FaceBox, FaceSwapper, Frame};
use faceflow::matcher::Embedding;
use faceflow::pipeline::{InProcessRunner, StageRunner, SwapPipeline, Watermark};
use faceflow::producer::Producer;
use faceflow::queue::SqliteChannel;
use faceflow::storage::{CdnPaths, FsObjectStore, ObjectStore, TemplateCache};
use faceflow::worker::{FaceExtractOrchestrator, SwapOrchestrator};

/// The marker pixel [`MarkingSwapper`] paints at (0, 0).
pub const SWAP_MARKER: Rgba<u8> = Rgba([9, 9, 9, 255]);

/// Detects one face per opaque frame, embedding fixed at the x-axis.
/// Fully transparent frames have no faces.
pub struct OneFaceAnalyzer;

impl FaceAnalyzer for OneFaceAnalyzer {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<Face>, InferenceError> {
        if frame.pixels().all(|p| p.0[3] == 0) {
            return Ok(Vec::new());
        }
        Ok(vec![Face {
            bounds: FaceBox {
                x: 0,
                y: 0,
                width: 2,
                height: 2,
            },
            embedding: Embedding::new(vec![1.0, 0.0]),
        }])
    }
}

/// Paints [`SWAP_MARKER`] at (0, 0) so tests can tell the swapped file
/// from the original.
pub struct MarkingSwapper;

impl FaceSwapper for MarkingSwapper {
    fn swap_onto(
        &self,
        _source: &Face,
        _target: &Face,
        frame: &Frame,
    ) -> Result<Frame, InferenceError> {
        let mut out = frame.clone();
        out.put_pixel(0, 0, SWAP_MARKER);
        Ok(out)
    }
}

pub struct TestHarness {
    temp_dir: TempDir,
    pub db: Database,
    pub store: Arc<FsObjectStore>,
    pub channel: Arc<SqliteChannel>,
    /// Root of the filesystem object store, for direct assertions.
    pub store_root: PathBuf,
    /// Directory holding from_face/ and to_face/ pair images.
    pub pairs_dir: PathBuf,
    work_dir: PathBuf,
    faces_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let db = Database::open_in_memory()
            .expect("record store")
            .with_retry_delay(Duration::ZERO);
        let store_root = base.join("store");
        let store = Arc::new(FsObjectStore::new(&store_root));
        let channel = Arc::new(SqliteChannel::new(base.join("broker.db")));

        Self {
            db,
            store,
            channel,
            store_root,
            pairs_dir: base.join("pairs"),
            work_dir: base.join("work"),
            faces_dir: base.join("faces"),
            temp_dir,
        }
    }

    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn cdn_paths(&self) -> CdnPaths {
        CdnPaths {
            public_base: "https://cdn.test".to_string(),
            results_prefix: "results".to_string(),
            sources_prefix: "sources".to_string(),
            faces_prefix: "faces".to_string(),
        }
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.db.clone())
    }

    pub fn templates(&self) -> TemplateRepository {
        TemplateRepository::new(self.db.clone())
    }

    pub fn producer(&self) -> Producer {
        Producer::new(self.channel.clone(), self.jobs(), "swap", "faces")
    }

    /// Writes a solid PNG and returns its path.
    pub fn write_png(&self, relative: &str, color: [u8; 4]) -> PathBuf {
        let path = self.base().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        Frame::from_pixel(64, 64, Rgba(color)).save(&path).unwrap();
        path
    }

    /// Publishes a grey template photo into the object store under
    /// `sources/<template_id>.png`.
    pub fn publish_template(&self, template_id: &str) {
        let local = self.write_png(&format!("{}_src.png", template_id), [200, 200, 200, 255]);
        self.store
            .upload(&local, &format!("sources/{}.png", template_id))
            .unwrap();
    }

    /// Creates one from/to face pair under the harness pairs dir.
    pub fn write_face_pair(&self) {
        self.write_png("pairs/from_face/0.png", [10, 10, 10, 255]);
        self.write_png("pairs/to_face/0.png", [20, 20, 20, 255]);
    }

    pub fn in_process_runner(&self) -> Arc<InProcessRunner> {
        Arc::new(InProcessRunner::new(
            Arc::new(OneFaceAnalyzer),
            Arc::new(MarkingSwapper),
        ))
    }

    pub fn pipeline(&self, runner: Arc<dyn StageRunner>) -> SwapPipeline {
        SwapPipeline::new(
            self.store.clone(),
            runner,
            TemplateCache::new(self.base().join("cache")),
            self.cdn_paths(),
            self.work_dir.clone(),
        )
    }

    pub fn swap_orchestrator(&self, pipeline: SwapPipeline) -> SwapOrchestrator {
        SwapOrchestrator::new(self.channel.clone(), "swap", self.jobs(), pipeline)
    }

    pub fn extract_orchestrator(&self, runner: Arc<dyn StageRunner>) -> FaceExtractOrchestrator {
        FaceExtractOrchestrator::new(
            self.channel.clone(),
            "faces",
            self.templates(),
            runner,
            self.store.clone(),
            self.cdn_paths(),
            self.faces_dir.clone(),
            1,
        )
    }

    /// A small blue watermark, visually distinct from everything else
    /// the fakes paint.
    pub fn watermark(&self) -> Watermark {
        Watermark::from_frame(Frame::from_pixel(4, 4, Rgba([0, 0, 255, 255])))
    }

    /// Loads a delivered result straight from the store root.
    pub fn delivered(&self, key: &str) -> Frame {
        faceflow::inference::load_frame(&self.store_root.join(key)).expect("delivered result")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
