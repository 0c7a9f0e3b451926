//! Attendance marking session.
//!
//! Runs until the operator cancels: every step pulls one frame, locates a
//! face, compares it with each registered reference and logs students the
//! first time they fall under the threshold.

use crate::attendance::{AttendanceEntry, AttendanceLog};
use crate::locator::FaceLocator;
use crate::registry::Registry;
use crate::source::{CancelToken, FrameSource, SourceError};
use crate::types::{FaceImage, FaceRegion, FrameView, L2Matcher, MatchResult, Matcher};
use image::GrayImage;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no students registered")]
    EmptyRegistry,
    #[error("frame source: {0}")]
    Source(#[from] SourceError),
    #[error("attendance log: {0}")]
    Log(#[from] io::Error),
    #[error("session already stopped")]
    Stopped,
}

/// Result of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    Scanned {
        frame: GrayImage,
        /// Frames pulled so far, including this one.
        frames: u64,
        face: Option<FaceRegion>,
        /// Students marked present for the first time on this frame.
        newly_present: Vec<MatchResult>,
    },
    /// The cancel token was tripped; no frame was pulled.
    Stopped,
}

/// Progress notifications emitted by [`AttendanceSession::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent<'a> {
    /// Sent after every frame, once its matches have been reported.
    Frame { view: FrameView<'a>, present: usize },
    Present(MatchResult),
}

/// What a finished session recorded.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub frames: u64,
    pub present: Vec<AttendanceEntry>,
    pub log_path: PathBuf,
}

pub struct AttendanceSession<'r, M = L2Matcher> {
    registry: &'r Registry,
    log: AttendanceLog,
    matcher: M,
    threshold: f64,
    frames: u64,
    stopped: bool,
}

impl<'r> AttendanceSession<'r, L2Matcher> {
    /// Open (truncating) the log at `log_path` and prepare a session over
    /// `registry`.
    ///
    /// Fails with [`SessionError::EmptyRegistry`] before touching the log if
    /// nobody is registered.
    pub fn start(
        registry: &'r Registry,
        log_path: impl Into<PathBuf>,
        threshold: f64,
    ) -> Result<Self, SessionError> {
        if registry.is_empty() {
            return Err(SessionError::EmptyRegistry);
        }
        let log = AttendanceLog::create(log_path)?;
        tracing::info!(
            students = registry.len(),
            threshold,
            log = %log.path().display(),
            "attendance session started"
        );
        Ok(Self {
            registry,
            log,
            matcher: L2Matcher,
            threshold,
            frames: 0,
            stopped: false,
        })
    }
}

impl<'r, M: Matcher> AttendanceSession<'r, M> {
    /// Swap the comparison strategy.
    pub fn with_matcher<N: Matcher>(self, matcher: N) -> AttendanceSession<'r, N> {
        AttendanceSession {
            registry: self.registry,
            log: self.log,
            matcher,
            threshold: self.threshold,
            frames: self.frames,
            stopped: self.stopped,
        }
    }

    pub fn log(&self) -> &AttendanceLog {
        &self.log
    }

    /// Advance by one frame.
    pub fn step<S, L>(
        &mut self,
        source: &mut S,
        locator: &mut L,
        cancel: &CancelToken,
    ) -> Result<SessionStep, SessionError>
    where
        S: FrameSource + ?Sized,
        L: FaceLocator + ?Sized,
    {
        if self.stopped {
            return Err(SessionError::Stopped);
        }
        if cancel.is_cancelled() {
            self.stopped = true;
            tracing::info!(
                frames = self.frames,
                present = self.log.len(),
                "attendance session stopped"
            );
            return Ok(SessionStep::Stopped);
        }

        let frame = match source.next_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.stopped = true;
                return Err(e.into());
            }
        };
        self.frames += 1;

        let Some(region) = locator.find(&frame) else {
            return Ok(SessionStep::Scanned {
                frame,
                frames: self.frames,
                face: None,
                newly_present: Vec::new(),
            });
        };

        let query = FaceImage::normalize(&region.crop(&frame), self.registry.face_size());
        let mut newly_present = Vec::new();
        for hit in self
            .matcher
            .matches(&query, self.registry.records(), self.threshold)
        {
            if self.log.record(&hit.name)? {
                tracing::info!(name = %hit.name, distance = hit.distance, "marked present");
                newly_present.push(hit);
            }
        }

        Ok(SessionStep::Scanned {
            frame,
            frames: self.frames,
            face: Some(region),
            newly_present,
        })
    }

    /// Step until cancelled, reporting progress through `on_event`.
    pub fn run<S, L>(
        mut self,
        source: &mut S,
        locator: &mut L,
        cancel: &CancelToken,
        mut on_event: impl FnMut(SessionEvent<'_>),
    ) -> Result<SessionSummary, SessionError>
    where
        S: FrameSource + ?Sized,
        L: FaceLocator + ?Sized,
    {
        loop {
            match self.step(source, locator, cancel)? {
                SessionStep::Stopped => return Ok(self.finish()),
                SessionStep::Scanned {
                    frame,
                    frames,
                    face,
                    newly_present,
                } => {
                    for hit in newly_present {
                        on_event(SessionEvent::Present(hit));
                    }
                    on_event(SessionEvent::Frame {
                        view: FrameView {
                            image: &frame,
                            face,
                            frames,
                        },
                        present: self.log.len(),
                    });
                }
            }
        }
    }

    pub fn finish(self) -> SessionSummary {
        SessionSummary {
            frames: self.frames,
            present: self.log.entries().to_vec(),
            log_path: self.log.path().to_path_buf(),
        }
    }
}
