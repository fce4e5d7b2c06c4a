//! Video container/codec choice for the recorder.

use crate::hardware::MediaStream;

/// Most broadly playable first; the last entry is the generic fallback.
pub const VIDEO_MIME_PREFERENCES: [&str; 3] = [
    "video/mp4;codecs=avc1",
    "video/webm;codecs=vp8,opus",
    "video/webm",
];

pub const GENERIC_VIDEO_MIME: &str = "video/webm";

/// First supported preference. Falls back to the generic container rather
/// than failing when the runtime reports none of them.
pub fn select_video_mime(stream: &dyn MediaStream) -> &'static str {
    VIDEO_MIME_PREFERENCES
        .iter()
        .copied()
        .find(|mime| stream.supports_mime(mime))
        .unwrap_or(GENERIC_VIDEO_MIME)
}

/// `video/webm;codecs=vp8,opus` → `video/webm`
pub fn container_mime(mime_type: &str) -> &str {
    mime_type.split(';').next().unwrap_or(mime_type).trim()
}

pub fn file_extension(container: &str) -> &'static str {
    match container {
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        _ => "webm",
    }
}
