use crate::registry::StudentRecord;
use image::imageops::{self, FilterType};
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, in frame pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Detector score; scale depends on the detector.
    pub confidence: f64,
}

impl BoundingBox {
    /// Clip the box to a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` if nothing of the box lies inside the frame.
    pub fn clip(&self, frame_width: u32, frame_height: u32) -> Option<FaceRegion> {
        let x0 = i64::from(self.x).max(0);
        let y0 = i64::from(self.y).max(0);
        let x1 = (i64::from(self.x) + i64::from(self.width)).min(i64::from(frame_width));
        let y1 = (i64::from(self.y) + i64::from(self.height)).min(i64::from(frame_height));

        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(FaceRegion {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Part of a frame holding a face, always inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceRegion {
    pub fn crop(&self, frame: &GrayImage) -> GrayImage {
        imageops::crop_imm(frame, self.x, self.y, self.width, self.height).to_image()
    }

    /// Whether pixel (`x`, `y`) lies inside the region.
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.x..self.x + self.width).contains(&x) && (self.y..self.y + self.height).contains(&y)
    }
}

/// One frame pulled by a capture loop, lent to progress callbacks so the
/// caller can show it live.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameView<'a> {
    pub image: &'a GrayImage,
    /// Face found in this frame, if any.
    pub face: Option<FaceRegion>,
    /// Frames pulled so far, including this one.
    pub frames: u64,
}

/// A grayscale face crop resized to a fixed square size.
///
/// Construction always goes through [`FaceImage::normalize`], so two faces
/// normalized with the same size can be compared pixel by pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceImage {
    pixels: GrayImage,
}

impl FaceImage {
    /// Resize `face` to `size` × `size` with bilinear filtering.
    pub fn normalize(face: &GrayImage, size: u32) -> Self {
        let size = size.max(1);
        let pixels = if face.dimensions() == (size, size) {
            face.clone()
        } else {
            imageops::resize(face, size, size, FilterType::Triangle)
        };
        Self { pixels }
    }

    /// Side length in pixels.
    pub fn size(&self) -> u32 {
        self.pixels.width()
    }

    pub fn as_image(&self) -> &GrayImage {
        &self.pixels
    }

    /// Euclidean (L2) distance between the two intensity images.
    ///
    /// Returns `f64::INFINITY` if the sizes differ.
    pub fn distance(&self, other: &FaceImage) -> f64 {
        if self.pixels.dimensions() != other.pixels.dimensions() {
            return f64::INFINITY;
        }
        self.pixels
            .as_raw()
            .iter()
            .zip(other.pixels.as_raw())
            .map(|(&a, &b)| {
                let d = f64::from(a) - f64::from(b);
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }
}

/// A reference face that fell under the match threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub name: String,
    pub distance: f64,
}

/// Strategy for comparing a captured face against the registered references.
pub trait Matcher {
    /// Every gallery entry whose distance to `query` is below `threshold`,
    /// in gallery order.
    fn matches(&self, query: &FaceImage, gallery: &[StudentRecord], threshold: f64)
        -> Vec<MatchResult>;
}

/// Raw pixel L2-distance matcher.
///
/// Every entry is an independent candidate: a single frame may match
/// several students.
pub struct L2Matcher;

impl Matcher for L2Matcher {
    fn matches(
        &self,
        query: &FaceImage,
        gallery: &[StudentRecord],
        threshold: f64,
    ) -> Vec<MatchResult> {
        gallery
            .iter()
            .filter_map(|student| {
                let distance = query.distance(&student.face);
                tracing::trace!(name = %student.name, distance, "compared reference");
                (distance < threshold).then(|| MatchResult {
                    name: student.name.clone(),
                    distance,
                })
            })
            .collect()
    }
}
