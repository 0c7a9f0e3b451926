//! Camera-backed frame sources for the capture loops.

use rollcall_core::{CancelToken, FrameSource, SourceError};
use rollcall_hw::{Camera, CameraStream};

/// Opens a fresh frame source for each capture loop.
pub trait FrameFeed {
    fn open(&self) -> Result<Box<dyn FrameSource + '_>, SourceError>;
}

/// The station camera. Each loop gets its own mmap stream, released when the
/// loop ends.
pub struct CameraFeed {
    camera: Camera,
    cancel: CancelToken,
}

impl CameraFeed {
    pub fn new(camera: Camera, cancel: CancelToken) -> Self {
        Self { camera, cancel }
    }
}

impl FrameFeed for CameraFeed {
    fn open(&self) -> Result<Box<dyn FrameSource + '_>, SourceError> {
        let stream = self
            .camera
            .stream()
            .map_err(|e| SourceError::Capture(e.to_string()))?;
        Ok(Box::new(CameraSource {
            stream,
            cancel: &self.cancel,
        }))
    }
}

struct CameraSource<'a> {
    stream: CameraStream<'a>,
    cancel: &'a CancelToken,
}

impl FrameSource for CameraSource<'_> {
    fn next_frame(&mut self) -> Result<image::GrayImage, SourceError> {
        loop {
            let frame = self
                .stream
                .next_frame()
                .map_err(|e| SourceError::Capture(e.to_string()))?;

            // Dark frames are skipped, but handed back once an interrupt is
            // pending so the loop gets to see the token.
            if frame.is_dark && !self.cancel.is_cancelled() {
                tracing::trace!(seq = frame.sequence, "skipping dark frame");
                continue;
            }

            let (width, height) = (frame.width, frame.height);
            return frame.into_gray_image().ok_or_else(|| {
                SourceError::Capture(format!("frame buffer does not match {width}x{height}"))
            });
        }
    }
}
