use mw_core::clock::Clock;
use mw_core::moderation::Moderator;
use mw_core::pipeline::UploadPipeline;
use mw_core::probe::MediaProbe;
use mw_core::settings::GuestbookSettings;
use mw_core::traits::{AuthProvider, EntryStore, MediaStore};
use mw_core::validator::UploadValidator;
use std::sync::Arc;

/// State shared across all actix-web workers.
pub struct AppState {
    pub settings: GuestbookSettings,
    pub entries: Arc<dyn EntryStore>,
    pub auth: Arc<dyn AuthProvider>,
    pub clock: Arc<dyn Clock>,
    pub pipeline: UploadPipeline,
    pub moderator: Moderator,
}

impl AppState {
    pub fn new(
        settings: GuestbookSettings,
        entries: Arc<dyn EntryStore>,
        media: Arc<dyn MediaStore>,
        auth: Arc<dyn AuthProvider>,
        probe: Arc<dyn MediaProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let validator = UploadValidator::new(&settings, probe);
        let pipeline = UploadPipeline::new(&settings, validator, media, entries.clone());
        let moderator = Moderator::new(entries.clone(), clock.clone(), settings.self_delete_window);
        Self {
            settings,
            entries,
            auth,
            clock,
            pipeline,
            moderator,
        }
    }
}
