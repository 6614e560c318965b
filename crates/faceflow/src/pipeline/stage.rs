//! Stage execution: the heavy model passes run in an isolated process.
//!
//! A stage crash (OOM, native library abort) must kill only the stage,
//! never the worker, so the default runner spawns a configured external
//! executable per stage and judges success by its exit code. The
//! request travels as JSON on the child's stdin. [`InProcessRunner`]
//! executes the same contracts inside the worker process for embedders
//! that link the models directly, and for tests.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::InferenceError;
use crate::inference::{
    load_frame, save_frame, Enhancer, FaceAnalyzer, FaceSwapper, VideoCodec,
};
use crate::matcher::{swap_frame, MatchPolicy, ReferenceExtractor, SwapAssignment};

use super::error::PipelineError;

/// One from/to image pair on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacePairPaths {
    /// Image of the identity to find in the target media.
    pub source: PathBuf,
    /// Image of the identity to paint in its place.
    pub replacement: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapStageRequest {
    pub face_pairs: Vec<FacePairPaths>,
    pub target_path: PathBuf,
    pub output_path: PathBuf,
    pub is_image: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhanceStageRequest {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub is_image: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractStageRequest {
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub is_image: bool,
    /// Every Nth video frame is analysed.
    pub frame_stride: usize,
}

/// Executes the three heavy stages. Implementations block until the
/// stage finishes; there is no partial progress to report.
pub trait StageRunner: Send + Sync {
    fn run_swap(&self, request: &SwapStageRequest) -> Result<(), PipelineError>;

    fn run_enhance(&self, request: &EnhanceStageRequest) -> Result<(), PipelineError>;

    /// Writes one `<index>.png` crop per distinct identity into the
    /// request's output directory and returns how many were found.
    fn run_extract(&self, request: &ExtractStageRequest) -> Result<usize, PipelineError>;
}

/// Lists `from_face/` and `to_face/` under `dir` and pairs the files by
/// sorted name order. Surplus files on either side are dropped with a
/// warning.
pub fn collect_face_pairs(dir: &Path) -> Result<Vec<FacePairPaths>, PipelineError> {
    let sources = sorted_files(&dir.join("from_face"))?;
    let replacements = sorted_files(&dir.join("to_face"))?;

    if sources.len() != replacements.len() {
        warn!(
            "Unbalanced face pairs in {}: {} sources, {} replacements",
            dir.display(),
            sources.len(),
            replacements.len()
        );
    }

    Ok(sources
        .into_iter()
        .zip(replacements)
        .map(|(source, replacement)| FacePairPaths {
            source,
            replacement,
        })
        .collect())
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        if entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Runs each stage as a child process of the configured executable,
/// with the stage name as the only argument.
pub struct SubprocessRunner {
    command: PathBuf,
}

impl SubprocessRunner {
    pub fn new<P: AsRef<Path>>(command: P) -> Self {
        Self {
            command: command.as_ref().to_path_buf(),
        }
    }

    fn run_stage<R: Serialize>(&self, stage: &str, request: &R) -> Result<(), PipelineError> {
        let body = serde_json::to_string(request).map_err(|e| PipelineError::StageSpawn {
            stage: stage.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

        debug!("Spawning stage '{}' via {}", stage, self.command.display());
        let mut child = Command::new(&self.command)
            .arg(stage)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::StageSpawn {
                stage: stage.to_string(),
                source: e,
            })?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(body.as_bytes())
                .map_err(|e| PipelineError::StageSpawn {
                    stage: stage.to_string(),
                    source: e,
                })?;
        }
        drop(child.stdin.take());

        let status = child.wait().map_err(|e| PipelineError::StageSpawn {
            stage: stage.to_string(),
            source: e,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(PipelineError::StageFailed {
                stage: stage.to_string(),
                code: status.code().unwrap_or(-1),
            })
        }
    }
}

impl StageRunner for SubprocessRunner {
    fn run_swap(&self, request: &SwapStageRequest) -> Result<(), PipelineError> {
        self.run_stage("swap", request)
    }

    fn run_enhance(&self, request: &EnhanceStageRequest) -> Result<(), PipelineError> {
        self.run_stage("enhance", request)
    }

    fn run_extract(&self, request: &ExtractStageRequest) -> Result<usize, PipelineError> {
        self.run_stage("extract", request)?;
        // The child writes the crops; count what it produced.
        Ok(sorted_files(&request.output_dir)?.len())
    }
}

/// Runs the stages inside the worker process against injected model
/// implementations.
pub struct InProcessRunner {
    analyzer: Arc<dyn FaceAnalyzer>,
    swapper: Arc<dyn FaceSwapper>,
    enhancer: Option<Arc<dyn Enhancer>>,
    codec: Option<Arc<dyn VideoCodec>>,
    match_policy: MatchPolicy,
    extractor: ReferenceExtractor,
}

impl InProcessRunner {
    pub fn new(analyzer: Arc<dyn FaceAnalyzer>, swapper: Arc<dyn FaceSwapper>) -> Self {
        Self {
            analyzer,
            swapper,
            enhancer: None,
            codec: None,
            match_policy: MatchPolicy::default(),
            extractor: ReferenceExtractor::default(),
        }
    }

    pub fn with_enhancer(mut self, enhancer: Arc<dyn Enhancer>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn with_codec(mut self, codec: Arc<dyn VideoCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Loads the pair images and turns each into a swap assignment.
    /// Pairs where either image has no detectable face are skipped with
    /// a warning; a request where no pair survives is a detection
    /// failure.
    fn build_assignments(
        &self,
        pairs: &[FacePairPaths],
    ) -> Result<Vec<SwapAssignment>, PipelineError> {
        let mut assignments = Vec::new();
        for pair in pairs {
            let source_face = self.analyzer.detect_one(&load_frame(&pair.source)?)?;
            let replacement_face = self.analyzer.detect_one(&load_frame(&pair.replacement)?)?;
            match (source_face, replacement_face) {
                (Some(source), Some(replacement)) => assignments.push(SwapAssignment {
                    source,
                    replacement,
                }),
                _ => warn!(
                    "Skipping pair {} -> {}: no detectable face",
                    pair.source.display(),
                    pair.replacement.display()
                ),
            }
        }
        if assignments.is_empty() {
            return Err(InferenceError::Detection(
                "no usable face pair in request".to_string(),
            )
            .into());
        }
        Ok(assignments)
    }

    fn codec(&self, path: &Path) -> Result<&dyn VideoCodec, PipelineError> {
        self.codec
            .as_deref()
            .ok_or_else(|| {
                PipelineError::Inference(InferenceError::NoVideoCodec {
                    path: path.to_path_buf(),
                })
            })
    }
}

impl StageRunner for InProcessRunner {
    fn run_swap(&self, request: &SwapStageRequest) -> Result<(), PipelineError> {
        let assignments = self.build_assignments(&request.face_pairs)?;

        if request.is_image {
            let frame = load_frame(&request.target_path)?;
            let outcome = swap_frame(
                &frame,
                &assignments,
                self.analyzer.as_ref(),
                self.swapper.as_ref(),
                &self.match_policy,
            )?;
            info!(
                "Swapped {}/{} faces in {}",
                outcome.swapped,
                outcome.detected,
                request.target_path.display()
            );
            save_frame(&outcome.frame, &request.output_path)?;
            return Ok(());
        }

        let codec = self.codec(&request.target_path)?;
        let mut source = codec.open_source(&request.target_path)?;
        let fps = source.fps();

        let Some(first) = source.next_frame()? else {
            return Err(PipelineError::Inference(InferenceError::MediaDecode {
                path: request.target_path.clone(),
                reason: "no frames".to_string(),
            }));
        };

        let mut sink = codec.create_sink(&request.output_path, first.width(), first.height(), fps)?;
        let mut frame = first;
        loop {
            let outcome = swap_frame(
                &frame,
                &assignments,
                self.analyzer.as_ref(),
                self.swapper.as_ref(),
                &self.match_policy,
            )?;
            sink.write_frame(&outcome.frame)?;
            match source.next_frame()? {
                Some(next) => frame = next,
                None => break,
            }
        }
        sink.finish()?;
        Ok(())
    }

    fn run_enhance(&self, request: &EnhanceStageRequest) -> Result<(), PipelineError> {
        match &self.enhancer {
            Some(enhancer) => {
                enhancer.enhance(&request.input_path, &request.output_path)?;
                Ok(())
            }
            // No enhancer configured: pass the input through untouched.
            None => {
                fs::copy(&request.input_path, &request.output_path).map_err(|e| {
                    PipelineError::Io {
                        path: request.output_path.clone(),
                        source: e,
                    }
                })?;
                Ok(())
            }
        }
    }

    fn run_extract(&self, request: &ExtractStageRequest) -> Result<usize, PipelineError> {
        let references = if request.is_image {
            let frame = load_frame(&request.source_path)?;
            self.extractor
                .extract_from_photo(&frame, self.analyzer.as_ref())?
        } else {
            let codec = self.codec(&request.source_path)?;
            let mut source = codec.open_source(&request.source_path)?;
            self.extractor.extract_from_source(
                source.as_mut(),
                request.frame_stride,
                self.analyzer.as_ref(),
            )?
        };

        fs::create_dir_all(&request.output_dir).map_err(|e| PipelineError::Io {
            path: request.output_dir.clone(),
            source: e,
        })?;
        for (index, reference) in references.iter().enumerate() {
            let path = request.output_dir.join(format!("{}.png", index));
            save_frame(&reference.image, &path)?;
        }
        info!(
            "Extracted {} reference faces from {}",
            references.len(),
            request.source_path.display()
        );
        Ok(references.len())
    }
}
