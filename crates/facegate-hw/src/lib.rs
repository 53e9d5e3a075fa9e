//! Camera capture.
//!
//! Provides V4L2-based single-frame capture, delivering RGB frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, PixelFormat, DEFAULT_DEVICE};
pub use frame::Frame;
