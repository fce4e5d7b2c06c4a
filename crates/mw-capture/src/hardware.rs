//! Camera and microphone ports. A platform backend implements these; the
//! session never touches a device any other way.

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    /// Front camera; the preview is shown mirrored
    User,
    /// Rear camera
    Environment,
}

impl Facing {
    pub fn toggled(self) -> Self {
        match self {
            Facing::User => Facing::Environment,
            Facing::Environment => Facing::User,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    pub audio: bool,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// One RGBA frame, in the orientation the live preview shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

#[async_trait]
pub trait CaptureHardware: Send + Sync {
    /// Opens a device stream. Fails when permission is refused or no device exists.
    async fn open_stream(&self, constraints: &StreamConstraints) -> anyhow::Result<Box<dyn MediaStream>>;
}

/// An open device stream. Exclusively owned by one capture session.
pub trait MediaStream: Send {
    fn grab_frame(&mut self) -> anyhow::Result<Frame>;

    /// Whether the active video track can drive a torch/flash.
    fn supports_torch(&self) -> bool;

    fn set_torch(&mut self, on: bool) -> anyhow::Result<()>;

    fn supports_mime(&self, mime_type: &str) -> bool;

    fn start_recording(&mut self, mime_type: &str) -> anyhow::Result<Box<dyn Recorder>>;

    /// Stops every track and releases the device.
    fn stop(&mut self);
}

/// A running recorder. Dropping it without `finish` discards the recording.
pub trait Recorder: Send {
    /// Stops recording and returns the collected data chunks in order.
    fn finish(self: Box<Self>) -> anyhow::Result<Vec<Bytes>>;
}
