//! Shared fixtures for the cross-crate tests: a wall wired to in-memory
//! stores and a manual clock.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use mw_core::clock::ManualClock;
use mw_core::models::{MediaType, MediaUpload, PostRequest, UploaderId};
use mw_core::moderation::Moderator;
use mw_core::pipeline::UploadPipeline;
use mw_core::probe::ContainerProbe;
use mw_core::settings::GuestbookSettings;
use mw_core::traits::{EntryStore, MediaStore};
use mw_core::validator::UploadValidator;
use mw_store_memory::{MemoryEntryStore, MemoryMediaStore};
use std::sync::Arc;

pub fn wedding_evening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 20, 20, 30, 0).unwrap()
}

pub struct Wall {
    pub settings: GuestbookSettings,
    pub clock: Arc<ManualClock>,
    pub entries: Arc<MemoryEntryStore>,
    pub media: Arc<MemoryMediaStore>,
    pub pipeline: UploadPipeline,
    pub moderator: Moderator,
}

impl Wall {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(wedding_evening()));
        let entries = Arc::new(MemoryEntryStore::with_clock(clock.clone()));
        let media = Arc::new(MemoryMediaStore::new());
        Self::assemble(clock, entries, media)
    }

    fn assemble(clock: Arc<ManualClock>, entries: Arc<MemoryEntryStore>, media: Arc<MemoryMediaStore>) -> Self {
        let settings = GuestbookSettings::default();
        let pipeline = pipeline_with(&settings, media.clone(), entries.clone());
        let moderator = Moderator::new(entries.clone(), clock.clone(), settings.self_delete_window);
        Self {
            settings,
            clock,
            entries,
            media,
            pipeline,
            moderator,
        }
    }
}

impl Default for Wall {
    fn default() -> Self {
        Self::new()
    }
}

pub fn pipeline_with(
    settings: &GuestbookSettings,
    media: Arc<dyn MediaStore>,
    entries: Arc<dyn EntryStore>,
) -> UploadPipeline {
    let validator = UploadValidator::new(settings, Arc::new(ContainerProbe));
    UploadPipeline::new(settings, validator, media, entries)
}

pub fn photo(size: usize) -> MediaUpload {
    let mut bytes = vec![0u8; size.max(4)];
    bytes[..4].copy_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    MediaUpload {
        bytes: Bytes::from(bytes),
        file_name: "IMG_2041.jpg".into(),
        mime_type: "image/jpeg".into(),
        kind: MediaType::Image,
    }
}

pub fn video(bytes: Vec<u8>) -> MediaUpload {
    MediaUpload {
        bytes: Bytes::from(bytes),
        file_name: "toast.mp4".into(),
        mime_type: "video/mp4".into(),
        kind: MediaType::Video,
    }
}

pub fn post(upload: MediaUpload, guest: &str, caption: Option<&str>) -> PostRequest {
    PostRequest {
        upload,
        caption: caption.map(str::to_string),
        uploader_id: UploaderId::from(guest),
    }
}
