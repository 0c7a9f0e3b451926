//! Test doubles shared by the unit tests.

use crate::locator::FaceLocator;
use crate::registry::StudentRecord;
use crate::source::{CancelToken, FrameSource, SourceError};
use crate::types::{BoundingBox, FaceImage};
use image::{GrayImage, Luma};
use std::collections::VecDeque;
use std::path::PathBuf;

pub fn uniform(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

pub fn record(name: &str, value: u8, size: u32) -> StudentRecord {
    StudentRecord {
        name: name.to_string(),
        face: FaceImage::normalize(&uniform(size, size, value), size),
        path: PathBuf::from(format!("{name}.png")),
    }
}

/// Locator with canned answers.
pub struct StubLocator {
    boxes: Option<Vec<BoundingBox>>,
    pub calls: usize,
}

impl StubLocator {
    /// Always report these boxes.
    pub fn boxes(boxes: Vec<BoundingBox>) -> Self {
        Self { boxes: Some(boxes), calls: 0 }
    }

    /// Report the whole frame as a face unless the frame is entirely black.
    pub fn face_unless_black() -> Self {
        Self { boxes: None, calls: 0 }
    }
}

impl FaceLocator for StubLocator {
    fn detect(&mut self, frame: &GrayImage) -> Vec<BoundingBox> {
        self.calls += 1;
        match &self.boxes {
            Some(boxes) => boxes.clone(),
            None if frame.pixels().all(|p| p.0[0] == 0) => Vec::new(),
            None => vec![BoundingBox {
                x: 0,
                y: 0,
                width: frame.width(),
                height: frame.height(),
                confidence: 1.0,
            }],
        }
    }
}

/// Replays a fixed list of frames.
///
/// Trips `cancel` after handing out the last frame; pulling past the end
/// reports a closed source.
pub struct ScriptedSource {
    frames: VecDeque<GrayImage>,
    cancel: Option<CancelToken>,
    pub pulled: usize,
}

impl ScriptedSource {
    pub fn new(frames: Vec<GrayImage>) -> Self {
        Self { frames: frames.into(), cancel: None, pulled: 0 }
    }

    pub fn cancel_when_drained(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }
}

impl FrameSource for ScriptedSource {
    fn next_frame(&mut self) -> Result<GrayImage, SourceError> {
        let frame = self.frames.pop_front().ok_or(SourceError::Closed)?;
        self.pulled += 1;
        if self.frames.is_empty() {
            if let Some(token) = &self.cancel {
                token.cancel();
            }
        }
        Ok(frame)
    }
}
