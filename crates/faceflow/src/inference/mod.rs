//! Interfaces to the opaque ML and codec collaborators.
//!
//! Face detection, embedding extraction, the swap model, the enhancement
//! model and video encode/decode are all external. This module defines
//! the contracts the rest of the crate programs against, plus the one
//! implementation that needs no native runtime: reading a single photo
//! frame with the `image` crate.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::InferenceError;
use crate::matcher::Embedding;

/// A decoded frame, RGBA. Photos are one frame; videos are a sequence.
pub type Frame = RgbaImage;

/// Bounding geometry of a detected face within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    /// Crops the face region out of `frame`, clamped to the frame edges.
    pub fn crop(&self, frame: &Frame) -> Frame {
        let x = self.x.min(frame.width().saturating_sub(1));
        let y = self.y.min(frame.height().saturating_sub(1));
        let width = self.width.min(frame.width() - x).max(1);
        let height = self.height.min(frame.height() - y).max(1);
        image::imageops::crop_imm(frame, x, y, width, height).to_image()
    }
}

/// A detected face: bounding geometry plus its embedding.
#[derive(Debug, Clone)]
pub struct Face {
    pub bounds: FaceBox,
    pub embedding: Embedding,
}

/// Face detection + embedding extraction, combined the way the external
/// analyser exposes them: one call yields every face in the frame with
/// its embedding already computed.
pub trait FaceAnalyzer: Send + Sync {
    fn detect_faces(&self, frame: &Frame) -> Result<Vec<Face>, InferenceError>;

    /// Convenience: the first detected face, if any. Pair images for
    /// swap assignments are expected to contain exactly one face; the
    /// first is taken when they contain more.
    fn detect_one(&self, frame: &Frame) -> Result<Option<Face>, InferenceError> {
        Ok(self.detect_faces(frame)?.into_iter().next())
    }
}

/// The swap model: paints `source`'s identity onto `target`'s region of
/// `frame`, returning the modified frame.
pub trait FaceSwapper: Send + Sync {
    fn swap_onto(
        &self,
        source: &Face,
        target: &Face,
        frame: &Frame,
    ) -> Result<Frame, InferenceError>;
}

/// File-level restoration model (e.g. GFPGAN-style upscaling). Consumes
/// and produces paths because the native runtime works on files.
pub trait Enhancer: Send + Sync {
    fn enhance(&self, input: &Path, output: &Path) -> Result<(), InferenceError>;
}

/// A sequence of decoded frames. Videos yield many; photos yield one.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, InferenceError>;

    /// Frames per second of the underlying media; 0.0 for stills.
    fn fps(&self) -> f32;
}

/// Consumes frames back into an encoded media file.
pub trait FrameSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<(), InferenceError>;
    fn finish(&mut self) -> Result<(), InferenceError>;
}

/// Video decode/encode, provided by an external codec integration.
pub trait VideoCodec: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>, InferenceError>;

    fn create_sink(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        fps: f32,
    ) -> Result<Box<dyn FrameSink>, InferenceError>;
}

/// Frame source over a single photo file.
pub struct ImageFrameSource {
    frame: Option<Frame>,
}

impl ImageFrameSource {
    pub fn open(path: &Path) -> Result<Self, InferenceError> {
        let frame = image::open(path)
            .map_err(|e| InferenceError::MediaDecode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_rgba8();
        Ok(Self { frame: Some(frame) })
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameSource for ImageFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, InferenceError> {
        Ok(self.frame.take())
    }

    fn fps(&self) -> f32 {
        0.0
    }
}

/// Loads one photo frame from disk.
pub fn load_frame(path: &Path) -> Result<Frame, InferenceError> {
    Ok(image::open(path)
        .map_err(|e| InferenceError::MediaDecode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .to_rgba8())
}

/// Saves a frame as PNG/JPEG based on the path extension.
pub fn save_frame(frame: &Frame, path: &Path) -> Result<(), InferenceError> {
    frame.save(path).map_err(|e| InferenceError::MediaDecode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// True when the extension names a photo format the pipeline treats as a
/// single frame (everything else is assumed to be video).
pub fn is_image_extension(extension: &str) -> bool {
    let name = format!("probe{}", extension);
    mime_guess::from_path(PathBuf::from(name))
        .first()
        .map(|m| m.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}
