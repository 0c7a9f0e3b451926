//! Frame type and pixel conversion: everything ends up as 8-bit intensity.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// View the frame as an `image` buffer, consuming it.
    ///
    /// Returns `None` if the pixel buffer does not match the dimensions.
    pub fn into_gray_image(self) -> Option<GrayImage> {
        GrayImage::from_raw(self.width, self.height, self.data)
    }
}

/// Pixels at or below this level count as black.
const DARK_LEVEL: u8 = 31;

/// First `expected` bytes of `buf`, or a length error naming `format`.
fn exact<'a>(format: &'static str, buf: &'a [u8], expected: usize) -> Result<&'a [u8], FrameError> {
    buf.get(..expected).ok_or(FrameError::InvalidLength {
        format,
        expected,
        actual: buf.len(),
    })
}

/// 8-bit grayscale buffer, trimmed of driver padding.
pub fn grey_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    Ok(exact("GREY", buf, (width * height) as usize)?.to_vec())
}

/// Luma plane of packed YUYV 4:2:2, where every pixel pair is `Y0 U Y1 V`.
pub fn yuyv_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let packed = exact("YUYV", buf, (width * height * 2) as usize)?;
    Ok(packed.chunks_exact(2).map(|px| px[0]).collect())
}

/// Downscale 16-bit little-endian grayscale to 8 bits by keeping the high byte.
pub fn y16_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let wide = exact("Y16", buf, (width * height * 2) as usize)?;
    Ok(wide.chunks_exact(2).map(|px| px[1]).collect())
}

/// Convert packed RGB24 to luma.
pub fn rgb24_to_grayscale(buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 3) as usize;
    let packed = exact("RGB3", buf, expected)?;
    let rgb = RgbImage::from_raw(width, height, packed.to_vec()).ok_or(
        FrameError::InvalidLength {
            format: "RGB3",
            expected,
            actual: buf.len(),
        },
    )?;
    Ok(DynamicImage::ImageRgb8(rgb).to_luma8().into_raw())
}

/// Decode a Motion-JPEG frame to luma.
///
/// Returns the decoded pixels together with the decoded dimensions, which
/// take precedence over the negotiated ones.
pub fn mjpeg_to_grayscale(buf: &[u8]) -> Result<(Vec<u8>, u32, u32), FrameError> {
    let decoded = image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();
    Ok((gray.into_raw(), width, height))
}

/// True when more than `max_dark_fraction` of the pixels are near black.
/// An empty frame is dark.
pub fn is_dark(gray: &[u8], max_dark_fraction: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let black = gray.iter().filter(|&&p| p <= DARK_LEVEL).count();
    black as f32 > max_dark_fraction * gray.len() as f32
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid {format} length: expected {expected}, got {actual}")]
    InvalidLength {
        format: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("MJPEG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}
