//! rollcall-core — Face location, reference registry and attendance sessions.
//!
//! Faces are located with a pretrained cascade detector and matched against
//! stored reference images by raw pixel distance.

pub mod attendance;
pub mod capture;
pub mod locator;
pub mod registry;
pub mod session;
pub mod source;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use attendance::{AttendanceEntry, AttendanceLog};
pub use capture::{CaptureError, CaptureOutcome, CaptureStep, FaceCapture};
pub use locator::{CascadeLocator, DetectorParams, FaceLocator, LocatorError};
pub use registry::{validate_name, Registry, RegistryError, StudentRecord, Upsert};
pub use session::{AttendanceSession, SessionError, SessionEvent, SessionStep, SessionSummary};
pub use source::{CancelToken, FrameSource, SourceError};
pub use types::{BoundingBox, FaceImage, FaceRegion, FrameView, L2Matcher, MatchResult, Matcher};
