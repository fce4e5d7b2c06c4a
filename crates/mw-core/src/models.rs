//! # Domain Models
//!
//! These structs represent the core entities of the memory wall.
//! Entry ids are UUID v7 so they stay roughly time-ordered in storage.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of media attached to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }

    /// Infers the kind from a MIME type such as `video/webm;codecs=vp8`.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let essence = mime_type.split(';').next()?.trim();
        let (top, sub) = essence.split_once('/')?;
        if sub.is_empty() {
            return None;
        }
        match top.to_ascii_lowercase().as_str() {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Locally generated pseudo-identity of a guest's browser or device.
///
/// It only lets a device recognise its own posts for the self-delete
/// window. It is not an account and proves nothing about who sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploaderId(String);

impl UploaderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UploaderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for UploaderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UploaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single guestbook post: media reference plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: Uuid,
    pub media_url: String,
    pub media_type: MediaType,
    /// Concrete content type, needed by clients for playback
    pub mime_type: String,
    pub caption: Option<String>,
    /// Assigned by the entry store; the ordering key (newest first)
    pub created_at: DateTime<Utc>,
    pub uploader_id: UploaderId,
    /// Cosmetic tilt in degrees, fixed for the entry's lifetime
    pub rotation_hint: f32,
    /// Soft-delete marker. Hidden entries never leave the store through reads.
    pub is_hidden: bool,
    /// Media store key the blob was written under
    pub storage_key: String,
}

/// Entry metadata as written by the upload pipeline.
///
/// There is deliberately no timestamp here: `created_at` belongs to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub media_url: String,
    pub media_type: MediaType,
    pub mime_type: String,
    pub caption: Option<String>,
    pub uploader_id: UploaderId,
    pub rotation_hint: f32,
    pub storage_key: String,
}

/// Partial update applied by moderation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryPatch {
    pub is_hidden: Option<bool>,
}

impl EntryPatch {
    pub fn hide() -> Self {
        Self {
            is_hidden: Some(true),
        }
    }
}

/// Change notification fanned out by an entry store.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryChange {
    Added(Entry),
    Updated(Entry),
}

impl EntryChange {
    pub fn entry(&self) -> &Entry {
        match self {
            EntryChange::Added(entry) | EntryChange::Updated(entry) => entry,
        }
    }
}

/// A candidate blob coming from the file picker or the capture adapter.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub mime_type: String,
    /// The kind the caller claims the blob is
    pub kind: MediaType,
}

impl MediaUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Everything the upload pipeline needs for one post.
#[derive(Debug, Clone)]
pub struct PostRequest {
    pub upload: MediaUpload,
    pub caption: Option<String>,
    pub uploader_id: UploaderId,
}

/// Who is looking at the wall, and with which authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub identity: UploaderId,
    /// Elevated through the admin credential check for this session
    pub is_admin: bool,
}

impl Viewer {
    pub fn guest(identity: UploaderId) -> Self {
        Self {
            identity,
            is_admin: false,
        }
    }

    pub fn admin(identity: UploaderId) -> Self {
        Self {
            identity,
            is_admin: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_type_from_mime_ignores_parameters() {
        assert_eq!(
            MediaType::from_mime("video/webm;codecs=vp8,opus"),
            Some(MediaType::Video)
        );
        assert_eq!(MediaType::from_mime("image/jpeg"), Some(MediaType::Image));
        assert_eq!(MediaType::from_mime("application/pdf"), None);
        assert_eq!(MediaType::from_mime("not a mime"), None);
    }

    #[test]
    fn generated_identities_are_distinct() {
        assert_ne!(UploaderId::generate(), UploaderId::generate());
    }
}
