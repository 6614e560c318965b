//! Branding overlay for delivered results.
//!
//! Photos get the mark composited at a fixed offset from the top-left.
//! Videos rotate the mark through the four corners, holding each corner
//! for a fixed wall-clock duration. The rotation starts at corner 1,
//! not corner 0: the corner index is advanced before the first frame is
//! stamped, and changing that would silently rebrand already-delivered
//! results.

use std::path::Path;

use image::imageops::overlay;

use crate::error::InferenceError;
use crate::inference::{load_frame, save_frame, Frame, VideoCodec};

use super::error::PipelineError;

/// Fixed composite position for photos.
pub const PHOTO_OFFSET: (i64, i64) = (25, 25);
/// Distance from the frame edge for video corner placement.
pub const CORNER_MARGIN: u32 = 50;
/// Wall-clock seconds the mark stays in one corner.
pub const SECONDS_PER_CORNER: f32 = 3.0;

/// The watermark image plus the placement rules.
#[derive(Clone)]
pub struct Watermark {
    image: Frame,
}

impl Watermark {
    pub fn open(path: &Path) -> Result<Self, InferenceError> {
        Ok(Self {
            image: load_frame(path)?,
        })
    }

    pub fn from_frame(image: Frame) -> Self {
        Self { image }
    }

    /// Corner coordinates in rotation order: top-left, top-right,
    /// bottom-right, bottom-left. Coordinates are clamped to the origin
    /// when the frame is smaller than mark plus margin.
    fn corner_positions(&self, frame_width: u32, frame_height: u32) -> [(i64, i64); 4] {
        let margin = CORNER_MARGIN as i64;
        let right = (frame_width as i64 - self.image.width() as i64 - margin).max(0);
        let bottom = (frame_height as i64 - self.image.height() as i64 - margin).max(0);
        [
            (margin, margin),
            (right, margin),
            (right, bottom),
            (margin, bottom),
        ]
    }

    /// Which corner a given frame index is stamped in. The index is
    /// advanced at frame zero, so playback starts at corner 1.
    pub fn corner_for_frame(frame_index: usize, fps: f32) -> usize {
        let frames_per_corner = ((SECONDS_PER_CORNER * fps) as usize).max(1);
        (frame_index / frames_per_corner + 1) % 4
    }

    /// Stamps a photo in place at [`PHOTO_OFFSET`].
    pub fn apply_to_photo(&self, frame: &mut Frame) {
        overlay(frame, &self.image, PHOTO_OFFSET.0, PHOTO_OFFSET.1);
    }

    /// Stamps one video frame in the corner its index maps to.
    pub fn apply_to_video_frame(&self, frame: &mut Frame, frame_index: usize, fps: f32) {
        let corner = Self::corner_for_frame(frame_index, fps);
        let (x, y) = self.corner_positions(frame.width(), frame.height())[corner];
        overlay(frame, &self.image, x, y);
    }

    /// Stamps a photo file on disk, overwriting it.
    pub fn stamp_photo_file(&self, path: &Path) -> Result<(), PipelineError> {
        let mut frame = load_frame(path)?;
        self.apply_to_photo(&mut frame);
        save_frame(&frame, path)?;
        Ok(())
    }

    /// Re-encodes a video file with the mark stamped on every frame,
    /// overwriting the input.
    pub fn stamp_video_file(
        &self,
        path: &Path,
        codec: &dyn VideoCodec,
    ) -> Result<(), PipelineError> {
        let mut source = codec.open_source(path)?;
        let fps = source.fps();

        let Some(first) = source.next_frame()? else {
            return Ok(());
        };

        let stamped_path = path.with_extension("stamped.tmp");
        let mut sink = codec.create_sink(&stamped_path, first.width(), first.height(), fps)?;

        let mut frame_index = 0usize;
        let mut frame = first;
        loop {
            let mut stamped = frame.clone();
            self.apply_to_video_frame(&mut stamped, frame_index, fps);
            sink.write_frame(&stamped)?;
            frame_index += 1;

            match source.next_frame()? {
                Some(next) => frame = next,
                None => break,
            }
        }
        sink.finish()?;

        std::fs::rename(&stamped_path, path).map_err(|e| PipelineError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}
