//! Frame input and operator interrupt.

use image::GrayImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("frame source closed")]
    Closed,
    #[error("capture failed: {0}")]
    Capture(String),
}

/// A blocking supplier of single-channel intensity frames.
pub trait FrameSource {
    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<GrayImage, SourceError>;
}

/// Shared interrupt flag, polled once per frame by the capture loops.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clear a previous interrupt so the next loop starts fresh.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
