//! rollcall-hw — Camera capture for the attendance station.
//!
//! Provides V4L2-based camera access and conversion of the negotiated
//! pixel format to 8-bit intensity frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
