//! Camera capture for the guestbook: live preview, photo stills and
//! time-capped video recording behind a hardware port.

pub mod codec;
pub mod hardware;
pub mod session;
pub mod still;

#[cfg(any(test, feature = "testing"))]
pub mod fake;

pub use hardware::{CaptureHardware, Facing, Frame, MediaStream, Recorder, StreamConstraints};
pub use session::{CaptureMode, CaptureSession, CaptureState, CapturedMedia};
