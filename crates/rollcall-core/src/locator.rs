//! Face location via a pretrained cascade detector.
//!
//! Detection is delegated to `rustface` (funnel-structured cascade, SeetaFace
//! model format). The locator only picks the first candidate and crops it.

use crate::types::{BoundingBox, FaceRegion};
use image::GrayImage;
use rustface::{Detector, ImageData};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Smallest face size the cascade supports.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;

/// Pyramid scale factors the cascade accepts.
const MIN_SCALE_FACTOR: f32 = 0.01;
const MAX_SCALE_FACTOR: f32 = 0.99;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("cascade model not found: {0}")]
    ModelNotFound(String),
    #[error("failed to load cascade model {path}: {reason}")]
    ModelLoad { path: String, reason: String },
    #[error("invalid detector parameters: {0}")]
    InvalidParams(String),
}

/// Tuning knobs for the cascade detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    /// Smallest face edge, in pixels, the detector searches for.
    pub min_face_size: u32,
    /// Minimum classifier score for a candidate to be reported.
    pub score_threshold: f64,
    /// Per-level downscale of the image pyramid, in [0.01, 0.99].
    pub pyramid_scale_factor: f32,
    /// Sliding-window step in pixels, both axes.
    pub window_step: u32,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            min_face_size: 40,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            window_step: 4,
        }
    }
}

impl DetectorParams {
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.min_face_size < MIN_SUPPORTED_FACE_SIZE {
            return Err(LocatorError::InvalidParams(format!(
                "min_face_size must be at least {MIN_SUPPORTED_FACE_SIZE}, got {}",
                self.min_face_size
            )));
        }
        if !(MIN_SCALE_FACTOR..=MAX_SCALE_FACTOR).contains(&self.pyramid_scale_factor) {
            return Err(LocatorError::InvalidParams(format!(
                "pyramid_scale_factor must be in [{MIN_SCALE_FACTOR}, {MAX_SCALE_FACTOR}], got {}",
                self.pyramid_scale_factor
            )));
        }
        if self.window_step == 0 {
            return Err(LocatorError::InvalidParams(
                "window_step must be at least 1".into(),
            ));
        }
        if !(self.score_threshold.is_finite() && self.score_threshold > 0.0) {
            return Err(LocatorError::InvalidParams(format!(
                "score_threshold must be a positive number, got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// Finds face regions in intensity frames.
pub trait FaceLocator {
    /// All candidate face boxes, in detector order.
    fn detect(&mut self, frame: &GrayImage) -> Vec<BoundingBox>;

    /// The first candidate clipped to the frame, if any.
    ///
    /// The detector's order is authoritative; no ranking among multiple
    /// faces is attempted.
    fn find(&mut self, frame: &GrayImage) -> Option<FaceRegion> {
        let first = self.detect(frame).into_iter().next()?;
        first.clip(frame.width(), frame.height())
    }

    /// Crop of the first candidate, if any.
    fn locate(&mut self, frame: &GrayImage) -> Option<GrayImage> {
        self.find(frame).map(|region| region.crop(frame))
    }
}

/// `rustface`-backed cascade locator.
pub struct CascadeLocator {
    detector: Box<dyn Detector>,
    min_face_size: u32,
}

impl CascadeLocator {
    /// Load the cascade model and configure the detector.
    pub fn load(model_path: &Path, params: &DetectorParams) -> Result<Self, LocatorError> {
        params.validate()?;

        if !model_path.exists() {
            return Err(LocatorError::ModelNotFound(model_path.display().to_string()));
        }

        let load_err = |reason: String| LocatorError::ModelLoad {
            path: model_path.display().to_string(),
            reason,
        };
        let file = File::open(model_path).map_err(|e| load_err(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| load_err(e.to_string()))?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(params.min_face_size);
        detector.set_score_thresh(params.score_threshold);
        detector.set_pyramid_scale_factor(params.pyramid_scale_factor);
        detector.set_slide_window_step(params.window_step, params.window_step);

        tracing::info!(
            path = %model_path.display(),
            min_face_size = params.min_face_size,
            score_threshold = params.score_threshold,
            pyramid_scale_factor = params.pyramid_scale_factor,
            "loaded cascade model"
        );

        Ok(Self {
            detector,
            min_face_size: params.min_face_size,
        })
    }
}

impl FaceLocator for CascadeLocator {
    fn detect(&mut self, frame: &GrayImage) -> Vec<BoundingBox> {
        let (width, height) = frame.dimensions();
        // The cascade rejects images smaller than its search window.
        if width < self.min_face_size || height < self.min_face_size {
            return Vec::new();
        }

        let image = ImageData::new(frame.as_raw(), width, height);
        self.detector
            .detect(&image)
            .into_iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width(),
                    height: bbox.height(),
                    confidence: face.score(),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StubLocator;
    use image::Luma;

    fn gradient(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + y) % 256) as u8]))
    }

    fn bbox(x: i32, y: i32, width: u32, height: u32) -> BoundingBox {
        BoundingBox { x, y, width, height, confidence: 1.0 }
    }

    #[test]
    fn test_locate_crops_first_candidate() {
        let frame = gradient(64, 48);
        let mut locator = StubLocator::boxes(vec![bbox(10, 5, 20, 15), bbox(0, 0, 8, 8)]);

        let face = locator.locate(&frame).unwrap();
        assert_eq!(face.dimensions(), (20, 15));
        assert_eq!(face.get_pixel(0, 0), frame.get_pixel(10, 5));
    }

    #[test]
    fn test_find_reports_clipped_region() {
        let mut locator = StubLocator::boxes(vec![bbox(-4, 30, 12, 20)]);
        assert_eq!(
            locator.find(&gradient(40, 40)),
            Some(FaceRegion { x: 0, y: 30, width: 8, height: 10 })
        );
    }

    #[test]
    fn test_locate_no_candidates() {
        let mut locator = StubLocator::boxes(vec![]);
        assert!(locator.locate(&gradient(32, 32)).is_none());
    }

    #[test]
    fn test_locate_clamps_to_frame() {
        let frame = gradient(40, 40);
        let mut locator = StubLocator::boxes(vec![bbox(30, -10, 20, 20)]);
        let face = locator.locate(&frame).unwrap();
        assert_eq!(face.dimensions(), (10, 10));
    }

    #[test]
    fn test_locate_box_outside_frame_is_no_face() {
        // First candidate wins even when it is unusable.
        let frame = gradient(40, 40);
        let mut locator = StubLocator::boxes(vec![bbox(100, 100, 10, 10), bbox(0, 0, 10, 10)]);
        assert!(locator.locate(&frame).is_none());
    }

    #[test]
    fn test_load_missing_model() {
        let result = CascadeLocator::load(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            &DetectorParams::default(),
        );
        assert!(matches!(result, Err(LocatorError::ModelNotFound(_))));
    }

    #[test]
    fn test_load_corrupt_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"xx").unwrap();

        let result = CascadeLocator::load(&path, &DetectorParams::default());
        assert!(matches!(result, Err(LocatorError::ModelLoad { .. })));
    }

    #[test]
    fn test_params_default_valid() {
        assert!(DetectorParams::default().validate().is_ok());
    }

    #[test]
    fn test_params_rejects_small_faces() {
        let params = DetectorParams { min_face_size: 12, ..Default::default() };
        assert!(matches!(params.validate(), Err(LocatorError::InvalidParams(_))));
    }

    #[test]
    fn test_params_rejects_bad_scale() {
        for factor in [0.0, 0.005, 0.995, 1.0, 1.1, f32::NAN] {
            let params = DetectorParams { pyramid_scale_factor: factor, ..Default::default() };
            assert!(params.validate().is_err(), "factor {factor} should be rejected");
        }
        for factor in [0.01, 0.99] {
            let params = DetectorParams { pyramid_scale_factor: factor, ..Default::default() };
            assert!(params.validate().is_ok(), "factor {factor} should be accepted");
        }
    }

    #[test]
    fn test_params_rejects_non_positive_score() {
        for score in [0.0, -1.5, f64::INFINITY, f64::NAN] {
            let params = DetectorParams { score_threshold: score, ..Default::default() };
            assert!(
                matches!(params.validate(), Err(LocatorError::InvalidParams(_))),
                "score {score} should be rejected"
            );
        }
    }

    #[test]
    fn test_load_rejects_params_before_reading_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, b"xx").unwrap();

        let params = DetectorParams { score_threshold: 0.0, ..Default::default() };
        assert!(matches!(
            CascadeLocator::load(&path, &params),
            Err(LocatorError::InvalidParams(_))
        ));
    }
}
