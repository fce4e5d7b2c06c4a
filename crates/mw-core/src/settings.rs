//! Named guestbook limits. Defaults match the wall as deployed.

use std::time::Duration;

pub const DEFAULT_MAX_FILE_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_MAX_VIDEO_DURATION: Duration = Duration::from_secs(15);
pub const DEFAULT_SELF_DELETE_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_RECORDING_COUNTDOWN: Duration = Duration::from_secs(3);
pub const DEFAULT_ROTATION_RANGE_DEG: f32 = 3.0;
pub const DEFAULT_PAGE_SIZE: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct GuestbookSettings {
    pub max_file_bytes: u64,
    pub max_video_duration: Duration,
    /// How long after `created_at` the uploader may remove their own entry
    pub self_delete_window: Duration,
    pub recording_countdown: Duration,
    /// Rotation hints are drawn uniformly from `[-range, range]`
    pub rotation_range_deg: f32,
    pub page_size: usize,
}

impl Default for GuestbookSettings {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_video_duration: DEFAULT_MAX_VIDEO_DURATION,
            self_delete_window: DEFAULT_SELF_DELETE_WINDOW,
            recording_countdown: DEFAULT_RECORDING_COUNTDOWN,
            rotation_range_deg: DEFAULT_ROTATION_RANGE_DEG,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
