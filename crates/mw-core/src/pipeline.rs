//! # Upload Pipeline
//!
//! validate → store media → write entry metadata, as one call.
//!
//! The entry write only runs after the media write returned a URL, so no
//! entry ever points at a missing blob. The reverse leak (blob stored,
//! metadata write failed) is tolerated and logged with the blob key.

use crate::error::{AppError, Result};
use crate::models::{Entry, NewEntry, PostRequest};
use crate::settings::GuestbookSettings;
use crate::traits::{EntryStore, MediaStore};
use crate::validator::UploadValidator;
use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Prefix of every media key written by the pipeline.
pub const MEDIA_KEY_PREFIX: &str = "guestbook";

#[derive(Clone)]
pub struct UploadPipeline {
    validator: UploadValidator,
    media: Arc<dyn MediaStore>,
    entries: Arc<dyn EntryStore>,
    rotation_range_deg: f32,
}

impl UploadPipeline {
    pub fn new(
        settings: &GuestbookSettings,
        validator: UploadValidator,
        media: Arc<dyn MediaStore>,
        entries: Arc<dyn EntryStore>,
    ) -> Self {
        Self {
            validator,
            media,
            entries,
            rotation_range_deg: settings.rotation_range_deg.abs(),
        }
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    /// Posts one entry. Not cancellable once the media write has started.
    #[instrument(skip_all, fields(
        uploader = %request.uploader_id,
        kind = %request.upload.kind,
        size = request.upload.size(),
    ))]
    pub async fn post(&self, request: PostRequest) -> Result<Entry> {
        let PostRequest {
            upload,
            caption,
            uploader_id,
        } = request;

        // 1. Re-validate even if the client already did
        self.validator.validate(&upload)?;

        // 2. Media first
        let key = media_key(&upload.file_name);
        let media_url = self
            .media
            .put_blob(&key, upload.bytes.clone(), &upload.mime_type)
            .await
            .map_err(|e| {
                error!(error = %e, key = %key, "media store write failed");
                AppError::UploadFailed(e.to_string())
            })?;

        // 3. Metadata, referencing the stored blob
        let new_entry = NewEntry {
            media_url,
            media_type: upload.kind,
            mime_type: upload.mime_type,
            caption: normalize_caption(caption),
            uploader_id,
            rotation_hint: self.rotation_hint(),
            storage_key: key.clone(),
        };
        let entry = self.entries.add_entry(new_entry).await.map_err(|e| {
            warn!(error = %e, orphaned_key = %key, "entry write failed after media was stored");
            AppError::MetadataWriteFailed(e.to_string())
        })?;

        info!(entry_id = %entry.id, key = %key, "entry posted");
        Ok(entry)
    }

    fn rotation_hint(&self) -> f32 {
        let range = self.rotation_range_deg;
        rand::rng().random_range(-range..=range)
    }
}

/// `guestbook/{unix_millis}-{random}-{file name}`; the random part keeps two
/// guests uploading `IMG_0001.jpg` in the same millisecond apart.
fn media_key(file_name: &str) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{MEDIA_KEY_PREFIX}/{}-{}-{}",
        Utc::now().timestamp_millis(),
        &nonce[..8],
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    // Browsers may send a full client path; keep only the last segment.
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Whitespace-only captions are dropped; anything else is stored as written.
fn normalize_caption(caption: Option<String>) -> Option<String> {
    caption.filter(|c| !c.trim().is_empty())
}
