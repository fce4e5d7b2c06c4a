//! # Capture session
//!
//! Photo mode:
//!
//! ```text
//! Idle ──start──▶ Live ──capture_photo──▶ Captured ──confirm──▶ Closed
//!                  ▲                          │
//!                  └─────────retake───────────┘
//! ```
//!
//! Video mode:
//!
//! ```text
//! Idle ──start──▶ Live ──record──▶ [Countdown] ──▶ Recording ──stop | deadline──▶ Captured
//! ```
//!
//! The device stream is held only in `Live`, `Countdown` and `Recording`,
//! and is released on capture, on `close` and on drop.

use crate::codec::{container_mime, file_extension, select_video_mime};
use crate::hardware::{CaptureHardware, Facing, MediaStream, StreamConstraints};
use crate::still::{encode_still, STILL_MIME};
use bytes::{Bytes, BytesMut};
use chrono::Utc;
use mw_core::error::{AppError, Result};
use mw_core::models::{MediaType, MediaUpload};
use mw_core::settings::GuestbookSettings;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const IDEAL_WIDTH: u32 = 1280;
const IDEAL_HEIGHT: u32 = 720;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    Photo,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Live,
    Countdown,
    Recording,
    Captured,
    Closed,
}

/// A confirmed-ready photo or video.
#[derive(Debug, Clone)]
pub struct CapturedMedia {
    pub bytes: Bytes,
    pub mime_type: String,
    pub kind: MediaType,
    pub file_name: String,
    /// Wall time between recorder start and stop; videos only
    pub recorded_for: Option<Duration>,
}

impl CapturedMedia {
    pub fn into_upload(self) -> MediaUpload {
        MediaUpload {
            bytes: self.bytes,
            file_name: self.file_name,
            mime_type: self.mime_type,
            kind: self.kind,
        }
    }
}

pub struct CaptureSession {
    hardware: Arc<dyn CaptureHardware>,
    mode: CaptureMode,
    facing: Facing,
    torch_on: bool,
    state: CaptureState,
    stream: Option<Box<dyn MediaStream>>,
    captured: Option<CapturedMedia>,
    max_recording: Duration,
    countdown: Duration,
}

impl CaptureSession {
    pub fn new(hardware: Arc<dyn CaptureHardware>, mode: CaptureMode, settings: &GuestbookSettings) -> Self {
        Self {
            hardware,
            mode,
            facing: Facing::User,
            torch_on: false,
            state: CaptureState::Idle,
            stream: None,
            captured: None,
            max_recording: settings.max_video_duration,
            countdown: settings.recording_countdown,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn captured(&self) -> Option<&CapturedMedia> {
        self.captured.as_ref()
    }

    /// Whether the torch toggle should be offered right now.
    pub fn torch_available(&self) -> bool {
        self.state == CaptureState::Live && self.stream.as_ref().is_some_and(|s| s.supports_torch())
    }

    /// Opens the camera: `Idle → Live`.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Idle, "start")?;
        self.acquire().await
    }

    /// Grabs a still from the preview: `Live → Captured`.
    pub fn capture_photo(&mut self) -> Result<&CapturedMedia> {
        if self.mode != CaptureMode::Photo {
            return Err(AppError::Conflict("photo capture needs photo mode".into()));
        }
        self.expect_state(CaptureState::Live, "capture a photo")?;

        let stream = self.live_stream()?;
        let frame = stream
            .grab_frame()
            .map_err(|e| AppError::Internal(format!("frame grab failed: {e}")))?;
        let bytes = encode_still(&frame, self.facing)
            .map_err(|e| AppError::Internal(format!("still encoding failed: {e}")))?;

        self.release();
        self.state = CaptureState::Captured;
        Ok(&*self.captured.insert(CapturedMedia {
            bytes,
            mime_type: STILL_MIME.to_string(),
            kind: MediaType::Image,
            file_name: format!("photo-{}.jpg", Utc::now().timestamp_millis()),
            recorded_for: None,
        }))
    }

    /// Records a clip: `Live → [Countdown →] Recording → Captured`.
    ///
    /// Recording ends when `stop` resolves or the duration ceiling is reached,
    /// whichever happens first. A single deadline is armed at recorder start.
    /// Resolving `stop` during the countdown cancels back to `Live` and
    /// returns `Ok(None)`.
    pub async fn record<F>(&mut self, with_countdown: bool, stop: F) -> Result<Option<&CapturedMedia>>
    where
        F: Future<Output = ()>,
    {
        if self.mode != CaptureMode::Video {
            return Err(AppError::Conflict("recording needs video mode".into()));
        }
        self.expect_state(CaptureState::Live, "record")?;
        tokio::pin!(stop);

        if with_countdown && !self.countdown.is_zero() {
            self.state = CaptureState::Countdown;
            tokio::select! {
                _ = tokio::time::sleep(self.countdown) => {}
                _ = &mut stop => {
                    debug!("recording cancelled during countdown");
                    self.state = CaptureState::Live;
                    return Ok(None);
                }
            }
        }

        let stream = self.live_stream()?;
        let mime = select_video_mime(&**stream);
        let recorder = stream.start_recording(mime).map_err(|e| {
            self.state = CaptureState::Live;
            AppError::Internal(format!("recorder failed to start: {e}"))
        })?;

        let started = Instant::now();
        let deadline = started + self.max_recording;
        self.state = CaptureState::Recording;
        info!(mime, limit = ?self.max_recording, "recording started");

        tokio::select! {
            _ = tokio::time::sleep_until(deadline) => debug!("recording ceiling reached"),
            _ = &mut stop => debug!("recording stopped"),
        }
        let recorded_for = started.elapsed();

        let chunks = recorder.finish();
        // Stop the device as soon as the recorder is done with it.
        self.release();
        let chunks = chunks.map_err(|e| {
            self.state = CaptureState::Closed;
            AppError::Internal(format!("recorder failed to finish: {e}"))
        })?;

        let mut blob = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            blob.extend_from_slice(chunk);
        }
        let container = container_mime(mime);
        self.state = CaptureState::Captured;
        Ok(Some(&*self.captured.insert(CapturedMedia {
            bytes: blob.freeze(),
            mime_type: container.to_string(),
            kind: MediaType::Video,
            file_name: format!("video-{}.{}", Utc::now().timestamp_millis(), file_extension(container)),
            recorded_for: Some(recorded_for),
        })))
    }

    /// Flips between front and rear cameras. Rebuilds the stream; torch goes off.
    pub async fn switch_facing(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Live, "switch camera")?;
        self.facing = self.facing.toggled();
        self.acquire().await
    }

    pub fn set_torch(&mut self, on: bool) -> Result<()> {
        self.expect_state(CaptureState::Live, "toggle the torch")?;
        let stream = self.live_stream()?;
        if !stream.supports_torch() {
            return Err(AppError::ValidationError("This camera has no torch.".into()));
        }
        stream
            .set_torch(on)
            .map_err(|e| AppError::Internal(format!("torch toggle failed: {e}")))?;
        self.torch_on = on;
        Ok(())
    }

    /// Discards the capture and reopens the camera: `Captured → Live`.
    pub async fn retake(&mut self) -> Result<()> {
        self.expect_state(CaptureState::Captured, "retake")?;
        self.captured = None;
        self.acquire().await
    }

    /// Hands the capture to the caller and ends the session.
    pub fn confirm(&mut self) -> Result<CapturedMedia> {
        self.expect_state(CaptureState::Captured, "confirm")?;
        let media = self
            .captured
            .take()
            .ok_or_else(|| AppError::Internal("captured state without media".into()))?;
        self.state = CaptureState::Closed;
        Ok(media)
    }

    /// Ends the session from any state, releasing the device.
    pub fn close(&mut self) {
        self.release();
        self.captured = None;
        self.state = CaptureState::Closed;
    }

    async fn acquire(&mut self) -> Result<()> {
        self.release();
        let constraints = StreamConstraints {
            facing: self.facing,
            audio: self.mode == CaptureMode::Video,
            ideal_width: IDEAL_WIDTH,
            ideal_height: IDEAL_HEIGHT,
        };
        match self.hardware.open_stream(&constraints).await {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = CaptureState::Live;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "camera access failed; closing capture");
                self.close();
                Err(AppError::DeviceAccessDenied(e.to_string()))
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.torch_on = false;
    }

    fn live_stream(&mut self) -> Result<&mut Box<dyn MediaStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| AppError::Internal("no open camera stream".into()))
    }

    fn expect_state(&self, wanted: CaptureState, action: &str) -> Result<()> {
        if self.state != wanted {
            return Err(AppError::Conflict(format!(
                "cannot {action} while {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeHardware;

    fn session(hardware: &Arc<FakeHardware>, mode: CaptureMode) -> CaptureSession {
        CaptureSession::new(hardware.clone(), mode, &GuestbookSettings::default())
    }

    #[tokio::test]
    async fn photo_flow_releases_the_device_on_capture() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);

        s.start().await.unwrap();
        assert_eq!(s.state(), CaptureState::Live);
        assert_eq!(hw.open_streams(), 1);

        let photo = s.capture_photo().unwrap();
        assert_eq!(photo.mime_type, "image/jpeg");
        assert_eq!(photo.kind, MediaType::Image);
        assert_eq!(s.state(), CaptureState::Captured);
        assert_eq!(hw.open_streams(), 0);

        s.retake().await.unwrap();
        assert_eq!(s.state(), CaptureState::Live);
        assert!(s.captured().is_none());
        s.capture_photo().unwrap();

        let media = s.confirm().unwrap();
        assert_eq!(s.state(), CaptureState::Closed);
        assert!(media.file_name.starts_with("photo-"));
    }

    #[tokio::test]
    async fn photo_mode_requests_no_audio() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        let c = hw.last_constraints().unwrap();
        assert!(!c.audio);
        assert_eq!(c.facing, Facing::User);
        assert_eq!((c.ideal_width, c.ideal_height), (1280, 720));
    }

    #[tokio::test]
    async fn denied_access_closes_the_session() {
        let hw = Arc::new(FakeHardware {
            deny: true,
            ..Default::default()
        });
        let mut s = session(&hw, CaptureMode::Video);
        let err = s.start().await.unwrap_err();
        assert!(matches!(err, AppError::DeviceAccessDenied(_)));
        assert_eq!(s.state(), CaptureState::Closed);
        assert_eq!(hw.open_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unstopped_recording_ends_at_the_ceiling() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();
        assert!(hw.last_constraints().unwrap().audio);

        let clip = s
            .record(false, std::future::pending())
            .await
            .unwrap()
            .cloned()
            .unwrap();
        assert_eq!(clip.recorded_for, Some(Duration::from_secs(15)));
        assert_eq!(clip.kind, MediaType::Video);
        assert_eq!(s.state(), CaptureState::Captured);
        assert_eq!(hw.open_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_precedes_recording() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();

        let began = Instant::now();
        let clip = s
            .record(true, tokio::time::sleep(Duration::from_secs(8)))
            .await
            .unwrap()
            .cloned()
            .unwrap();
        // 3 s countdown, then 5 s of recording before the manual stop.
        assert_eq!(clip.recorded_for, Some(Duration::from_secs(5)));
        assert_eq!(began.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_countdown_returns_to_live() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();

        let outcome = s
            .record(true, tokio::time::sleep(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(s.state(), CaptureState::Live);
        assert_eq!(hw.recordings_started(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recorded_chunks_assemble_into_one_container() {
        use mw_core::probe::{ContainerProbe, MediaProbe};

        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();
        s.record(false, tokio::time::sleep(Duration::from_millis(6_250)))
            .await
            .unwrap();

        let clip = s.confirm().unwrap();
        assert_eq!(clip.mime_type, "video/mp4");
        assert_eq!(
            ContainerProbe.video_duration(&clip.bytes).unwrap(),
            Duration::from_millis(6_250)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn recorder_uses_best_supported_codec() {
        let hw = Arc::new(FakeHardware {
            supported: vec!["video/webm;codecs=vp8,opus", "video/webm"],
            ..Default::default()
        });
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();
        s.record(false, std::future::ready(())).await.unwrap();

        assert_eq!(hw.last_recording_mime().as_deref(), Some("video/webm;codecs=vp8,opus"));
        let clip = s.captured().unwrap();
        assert_eq!(clip.mime_type, "video/webm");
        assert!(clip.file_name.ends_with(".webm"));
    }

    #[tokio::test(start_paused = true)]
    async fn recorder_falls_back_to_generic_container() {
        let hw = Arc::new(FakeHardware {
            supported: vec![],
            ..Default::default()
        });
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();
        s.record(false, std::future::ready(())).await.unwrap();
        assert_eq!(hw.last_recording_mime().as_deref(), Some("video/webm"));
    }

    #[tokio::test]
    async fn switching_camera_rebuilds_stream_and_resets_torch() {
        let hw = Arc::new(FakeHardware {
            torch: true,
            ..Default::default()
        });
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        assert!(s.torch_available());
        s.set_torch(true).unwrap();
        assert!(s.torch_on());

        s.switch_facing().await.unwrap();
        assert_eq!(s.facing(), Facing::Environment);
        assert!(!s.torch_on());
        assert_eq!(hw.opened_total(), 2);
        assert_eq!(hw.open_streams(), 1);
        assert_eq!(hw.last_constraints().unwrap().facing, Facing::Environment);
    }

    #[tokio::test]
    async fn torch_requires_capability() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        assert!(!s.torch_available());
        assert!(matches!(s.set_torch(true), Err(AppError::ValidationError(_))));
    }

    #[tokio::test]
    async fn toggles_are_refused_outside_live() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        s.capture_photo().unwrap();
        assert!(matches!(s.switch_facing().await, Err(AppError::Conflict(_))));
        assert!(matches!(s.set_torch(true), Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn rear_camera_photo_is_not_mirrored() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        s.switch_facing().await.unwrap();
        let photo = s.capture_photo().unwrap().clone();

        let decoded = image::load_from_memory(&photo.bytes).unwrap().to_rgb8();
        // The fake camera paints its left half red.
        assert!(decoded.get_pixel(4, 8).0[0] > 150);
    }

    #[tokio::test]
    async fn selfie_photo_is_mirrored_back() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        let photo = s.capture_photo().unwrap().clone();

        let decoded = image::load_from_memory(&photo.bytes).unwrap().to_rgb8();
        assert!(decoded.get_pixel(4, 8).0[2] > 150);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_mid_recording_releases_the_device() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Video);
        s.start().await.unwrap();

        // Abandon the recording future, as a closed capture UI would.
        let abandoned = tokio::time::timeout(Duration::from_secs(2), s.record(false, std::future::pending())).await;
        assert!(abandoned.is_err());
        assert_eq!(s.state(), CaptureState::Recording);
        assert_eq!(hw.open_streams(), 1);

        s.close();
        assert_eq!(s.state(), CaptureState::Closed);
        assert_eq!(hw.open_streams(), 0);
    }

    #[tokio::test]
    async fn dropping_the_session_releases_the_device() {
        let hw = Arc::new(FakeHardware::default());
        {
            let mut s = session(&hw, CaptureMode::Photo);
            s.start().await.unwrap();
            assert_eq!(hw.open_streams(), 1);
        }
        assert_eq!(hw.open_streams(), 0);
    }

    #[tokio::test]
    async fn captured_photo_becomes_an_upload() {
        let hw = Arc::new(FakeHardware::default());
        let mut s = session(&hw, CaptureMode::Photo);
        s.start().await.unwrap();
        s.capture_photo().unwrap();
        let upload = s.confirm().unwrap().into_upload();
        assert_eq!(upload.kind, MediaType::Image);
        assert_eq!(upload.mime_type, "image/jpeg");
        assert!(!upload.bytes.is_empty());
    }
}
