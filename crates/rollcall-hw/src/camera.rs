//! V4L2 camera capture via the `v4l` crate.

use crate::frame::{self, Frame};
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::{Format, FourCC};

/// Number of mmap buffers queued per stream.
const STREAM_BUFFERS: u32 = 4;

/// Device nodes checked by [`Camera::list_devices`].
const MAX_DEVICE_INDEX: u32 = 16;

/// Linux errno for a device already held by another process.
const EBUSY: i32 = 16;

/// Fraction of near-black pixels above which a frame counts as dark.
const DARK_FRAME_THRESHOLD: f32 = 0.95;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame conversion failed: {0}")]
    Frame(#[from] frame::FrameError),
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
    /// Motion-JPEG, one JPEG image per buffer.
    Mjpeg,
    /// Packed 24-bit RGB.
    Rgb24,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"GREY" => Some(Self::Grey),
            b"Y16 " | b"Y16\0" => Some(Self::Y16),
            b"MJPG" => Some(Self::Mjpeg),
            b"RGB3" => Some(Self::Rgb24),
            _ => None,
        }
    }
}

/// V4L2 camera device handle.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl Camera {
    /// Open the camera at `/dev/video{index}`.
    pub fn open_index(index: u32, width: u32, height: u32) -> Result<Self, CameraError> {
        Self::open(&format!("/dev/video{index}"), width, height)
    }

    /// Open a V4L2 capture device by path and negotiate a format close to
    /// `width` x `height`.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| match e.raw_os_error() {
            Some(EBUSY) => CameraError::DeviceBusy,
            _ => CameraError::DeviceNotFound(format!("{device_path}: {e}")),
        })?;
        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("query capabilities: {e}")))?;
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }
        tracing::info!(device = device_path, driver = %caps.driver, card = %caps.card, "camera opened");

        let (format, pixel_format) = negotiate(&device, width, height)?;
        tracing::info!(
            width = format.width,
            height = format.height,
            fourcc = ?format.fourcc,
            ?pixel_format,
            "capture format"
        );

        Ok(Self {
            device,
            width: format.width,
            height: format.height,
            device_path: device_path.to_string(),
            fourcc: format.fourcc,
            pixel_format,
        })
    }

    /// Negotiated pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// Start streaming. The stream owns the mmap buffers and is torn down
    /// when dropped.
    pub fn stream(&self) -> Result<CameraStream<'_>, CameraError> {
        let stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
            .map_err(|e| {
                CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
            })?;
        Ok(CameraStream {
            camera: self,
            stream,
        })
    }

    /// Pull and discard `count` frames so auto-exposure can settle.
    pub fn warm_up(&self, count: usize) -> Result<(), CameraError> {
        if count == 0 {
            return Ok(());
        }
        tracing::info!(count, "discarding warmup frames");
        let mut stream = self.stream()?;
        for _ in 0..count {
            stream.next_frame()?;
        }
        Ok(())
    }

    /// Convert a raw buffer to grayscale based on the negotiated format.
    ///
    /// Returns the pixels and the actual frame dimensions.
    fn buf_to_grayscale(&self, buf: &[u8]) -> Result<(Vec<u8>, u32, u32), CameraError> {
        let (w, h) = (self.width, self.height);

        let gray = match self.pixel_format {
            PixelFormat::Grey => frame::grey_to_grayscale(buf, w, h)?,
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, w, h)?,
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, w, h)?,
            PixelFormat::Rgb24 => frame::rgb24_to_grayscale(buf, w, h)?,
            PixelFormat::Mjpeg => return Ok(frame::mjpeg_to_grayscale(buf)?),
        };
        Ok((gray, w, h))
    }

    /// Capture-capable devices among `/dev/video0` to `/dev/video15`.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..MAX_DEVICE_INDEX)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).and_then(|d| d.query_caps()).ok()?;
                caps.capabilities
                    .contains(CapFlags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card,
                        driver: caps.driver,
                        bus: caps.bus,
                    })
            })
            .collect()
    }
}

/// Ask for YUYV at the requested size and accept whatever supported format
/// the driver settles on.
fn negotiate(
    device: &Device,
    width: u32,
    height: u32,
) -> Result<(Format, PixelFormat), CameraError> {
    let mut wanted = device
        .format()
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("read format: {e}")))?;
    wanted.fourcc = FourCC::new(b"YUYV");
    wanted.width = width;
    wanted.height = height;

    let format = device
        .set_format(&wanted)
        .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;
    let pixel_format = PixelFormat::from_fourcc(format.fourcc).ok_or_else(|| {
        CameraError::FormatNegotiationFailed(format!(
            "driver chose {:?}; supported: YUYV, GREY, Y16, MJPG, RGB3",
            format.fourcc
        ))
    })?;
    Ok((format, pixel_format))
}

/// An active capture stream on a [`Camera`].
pub struct CameraStream<'a> {
    camera: &'a Camera,
    stream: MmapStream<'a>,
}

impl CameraStream<'_> {
    /// Block until the next frame is dequeued, converted to grayscale.
    pub fn next_frame(&mut self) -> Result<Frame, CameraError> {
        let (buf, meta) = self
            .stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        let sequence = meta.sequence;

        let (data, width, height) = self.camera.buf_to_grayscale(buf)?;
        let is_dark = frame::is_dark(&data, DARK_FRAME_THRESHOLD);

        Ok(Frame {
            data,
            width,
            height,
            sequence,
            is_dark,
        })
    }
}
