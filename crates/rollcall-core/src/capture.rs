//! Capture loop for registering or refreshing a reference face.
//!
//! Modelled as a state machine: each [`FaceCapture::step`] checks the cancel
//! token, pulls exactly one frame and runs the locator on it.

use crate::locator::FaceLocator;
use crate::source::{CancelToken, FrameSource, SourceError};
use crate::types::FrameView;
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source: {0}")]
    Source(#[from] SourceError),
    #[error("capture already finished")]
    Finished,
}

/// How a capture ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Crop of the first face found.
    Captured(GrayImage),
    /// The operator interrupted before a face was found.
    Cancelled,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStep {
    /// A frame was examined and held no face.
    Searching { frame: GrayImage, frames: u64 },
    Done(CaptureOutcome),
}

#[derive(Debug)]
enum State {
    Searching,
    Finished,
}

/// Pulls frames until a face is located or the token is cancelled.
#[derive(Debug)]
pub struct FaceCapture {
    state: State,
    frames: u64,
}

impl Default for FaceCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceCapture {
    pub fn new() -> Self {
        Self {
            state: State::Searching,
            frames: 0,
        }
    }

    /// Frames pulled so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Advance by one frame.
    pub fn step<S, L>(
        &mut self,
        source: &mut S,
        locator: &mut L,
        cancel: &CancelToken,
    ) -> Result<CaptureStep, CaptureError>
    where
        S: FrameSource + ?Sized,
        L: FaceLocator + ?Sized,
    {
        if matches!(self.state, State::Finished) {
            return Err(CaptureError::Finished);
        }

        if cancel.is_cancelled() {
            self.state = State::Finished;
            tracing::info!(frames = self.frames, "capture cancelled");
            return Ok(CaptureStep::Done(CaptureOutcome::Cancelled));
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.state = State::Finished;
                return Err(e.into());
            }
        };
        self.frames += 1;

        match locator.locate(&frame) {
            Some(face) => {
                self.state = State::Finished;
                tracing::debug!(
                    frames = self.frames,
                    width = face.width(),
                    height = face.height(),
                    "face captured"
                );
                Ok(CaptureStep::Done(CaptureOutcome::Captured(face)))
            }
            None => Ok(CaptureStep::Searching {
                frame,
                frames: self.frames,
            }),
        }
    }

    /// Step until done, lending every empty frame to `on_frame`.
    pub fn run<S, L>(
        mut self,
        source: &mut S,
        locator: &mut L,
        cancel: &CancelToken,
        mut on_frame: impl FnMut(FrameView<'_>),
    ) -> Result<CaptureOutcome, CaptureError>
    where
        S: FrameSource + ?Sized,
        L: FaceLocator + ?Sized,
    {
        loop {
            match self.step(source, locator, cancel)? {
                CaptureStep::Searching { frame, frames } => on_frame(FrameView {
                    image: &frame,
                    face: None,
                    frames,
                }),
                CaptureStep::Done(outcome) => return Ok(outcome),
            }
        }
    }
}
