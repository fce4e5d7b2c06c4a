//! # Moderation
//!
//! Two authorities may soft-delete an entry:
//! - the uploader's pseudo-identity, only inside the self-delete window;
//! - an admin session, at any time.
//!
//! Both only flip `is_hidden`; media and metadata are retained.

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::models::{Entry, EntryPatch, Viewer};
use crate::traits::EntryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// What the viewer may do with an entry right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DeleteAuthority {
    /// The uploader, with time left in the self-delete window
    Owner {
        #[serde(rename = "remainingMs", serialize_with = "as_millis")]
        remaining: Duration,
    },
    Admin,
    None,
}

impl DeleteAuthority {
    pub fn allows_delete(&self) -> bool {
        !matches!(self, DeleteAuthority::None)
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Time left in the self-delete window, if it is still open.
///
/// The window is closed-ended: at exactly `window` after creation it is still
/// open with zero remaining. A `created_at` in the future counts as just created.
pub fn self_delete_remaining(created_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> Option<Duration> {
    let elapsed = (now - created_at).to_std().unwrap_or(Duration::ZERO);
    window.checked_sub(elapsed)
}

pub fn delete_authority(entry: &Entry, viewer: &Viewer, now: DateTime<Utc>, window: Duration) -> DeleteAuthority {
    if viewer.identity == entry.uploader_id {
        if let Some(remaining) = self_delete_remaining(entry.created_at, now, window) {
            return DeleteAuthority::Owner { remaining };
        }
    }
    if viewer.is_admin {
        return DeleteAuthority::Admin;
    }
    DeleteAuthority::None
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub entry_id: Uuid,
    pub viewer: Viewer,
    /// The user explicitly confirmed; deletes cannot be undone from the wall
    pub confirmed: bool,
}

#[derive(Clone)]
pub struct Moderator {
    entries: Arc<dyn EntryStore>,
    clock: Arc<dyn Clock>,
    self_delete_window: Duration,
}

impl Moderator {
    pub fn new(entries: Arc<dyn EntryStore>, clock: Arc<dyn Clock>, self_delete_window: Duration) -> Self {
        Self {
            entries,
            clock,
            self_delete_window,
        }
    }

    /// Soft-deletes an entry on behalf of its owner or an admin.
    #[instrument(skip_all, fields(entry_id = %request.entry_id, admin = request.viewer.is_admin))]
    pub async fn delete(&self, request: DeleteRequest) -> Result<Entry> {
        if !request.confirmed {
            return Err(AppError::ValidationError(
                "Please confirm that you want to delete this memory.".into(),
            ));
        }

        let entry = self
            .entries
            .get_entry(request.entry_id)
            .await
            .map_err(|e| AppError::DeleteFailed(e.to_string()))?
            .ok_or_else(|| AppError::NotFound("Entry".into(), request.entry_id.to_string()))?;

        let authority = delete_authority(&entry, &request.viewer, self.clock.now(), self.self_delete_window);
        if !authority.allows_delete() {
            return Err(AppError::Unauthorized(
                "only the uploader within the delete window or an admin may delete".into(),
            ));
        }

        let hidden = self
            .entries
            .update_entry(entry.id, EntryPatch::hide())
            .await
            .map_err(|e| {
                warn!(error = %e, "soft delete failed");
                AppError::DeleteFailed(e.to_string())
            })?;

        info!(?authority, "entry hidden");
        Ok(hidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{MediaType, UploaderId};
    use crate::traits::MockEntryStore;
    use chrono::TimeZone;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 20, 21, 0, 0).unwrap()
    }

    fn entry(owner: &str) -> Entry {
        Entry {
            id: Uuid::now_v7(),
            media_url: "/media/guestbook/1-x.jpg".into(),
            media_type: MediaType::Image,
            mime_type: "image/jpeg".into(),
            caption: None,
            created_at: created(),
            uploader_id: UploaderId::from(owner),
            rotation_hint: 0.0,
            is_hidden: false,
            storage_key: "guestbook/1-x.jpg".into(),
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        created() + chrono::Duration::seconds(secs)
    }

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn owner_window_is_thirty_seconds() {
        let e = entry("guest-a");
        let owner = Viewer::guest(UploaderId::from("guest-a"));

        assert_eq!(
            delete_authority(&e, &owner, at(0), WINDOW),
            DeleteAuthority::Owner { remaining: WINDOW }
        );
        assert_eq!(
            delete_authority(&e, &owner, at(30), WINDOW),
            DeleteAuthority::Owner { remaining: Duration::ZERO }
        );
        assert_eq!(delete_authority(&e, &owner, at(31), WINDOW), DeleteAuthority::None);
    }

    #[test]
    fn other_guests_never_get_authority() {
        let e = entry("guest-a");
        let stranger = Viewer::guest(UploaderId::from("guest-b"));
        assert_eq!(delete_authority(&e, &stranger, at(1), WINDOW), DeleteAuthority::None);
    }

    #[test]
    fn admin_may_delete_at_any_age() {
        let e = entry("guest-a");
        let admin = Viewer::admin(UploaderId::from("staff"));
        assert_eq!(delete_authority(&e, &admin, at(10), WINDOW), DeleteAuthority::Admin);
        assert_eq!(delete_authority(&e, &admin, at(600), WINDOW), DeleteAuthority::Admin);
    }

    #[test]
    fn future_timestamps_count_as_just_created() {
        let remaining = self_delete_remaining(at(5), at(0), WINDOW);
        assert_eq!(remaining, Some(WINDOW));
    }

    fn moderator(store: MockEntryStore, clock: Arc<ManualClock>) -> Moderator {
        Moderator::new(Arc::new(store), clock, WINDOW)
    }

    fn store_with(e: &Entry) -> MockEntryStore {
        let mut store = MockEntryStore::new();
        let found = e.clone();
        store
            .expect_get_entry()
            .returning(move |_| Ok(Some(found.clone())));
        store
    }

    #[tokio::test]
    async fn owner_delete_inside_window_hides_entry() {
        let e = entry("guest-a");
        let mut store = store_with(&e);
        let hidden = Entry { is_hidden: true, ..e.clone() };
        store
            .expect_update_entry()
            .withf(|_, patch| patch.is_hidden == Some(true))
            .times(1)
            .returning(move |_, _| Ok(hidden.clone()));

        let clock = Arc::new(ManualClock::new(at(12)));
        let result = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: e.id,
                viewer: Viewer::guest(UploaderId::from("guest-a")),
                confirmed: true,
            })
            .await
            .unwrap();
        assert!(result.is_hidden);
    }

    #[tokio::test]
    async fn owner_delete_after_window_is_refused() {
        let e = entry("guest-a");
        let mut store = store_with(&e);
        store.expect_update_entry().never();

        let clock = Arc::new(ManualClock::new(at(31)));
        let err = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: e.id,
                viewer: Viewer::guest(UploaderId::from("guest-a")),
                confirmed: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn admin_delete_ten_minutes_later() {
        let e = entry("guest-a");
        let mut store = store_with(&e);
        let hidden = Entry { is_hidden: true, ..e.clone() };
        store
            .expect_update_entry()
            .times(1)
            .returning(move |_, _| Ok(hidden.clone()));

        let clock = Arc::new(ManualClock::new(at(600)));
        let result = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: e.id,
                viewer: Viewer::admin(UploaderId::from("staff")),
                confirmed: true,
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn unconfirmed_delete_does_not_touch_the_store() {
        let mut store = MockEntryStore::new();
        store.expect_get_entry().never();
        store.expect_update_entry().never();

        let clock = Arc::new(ManualClock::new(at(1)));
        let err = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: Uuid::now_v7(),
                viewer: Viewer::admin(UploaderId::from("staff")),
                confirmed: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_delete_failed() {
        let e = entry("guest-a");
        let mut store = store_with(&e);
        store
            .expect_update_entry()
            .returning(|_, _| Err(anyhow::anyhow!("write timeout")));

        let clock = Arc::new(ManualClock::new(at(2)));
        let err = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: e.id,
                viewer: Viewer::guest(UploaderId::from("guest-a")),
                confirmed: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeleteFailed(_)));
    }

    #[tokio::test]
    async fn missing_entry_is_not_found() {
        let mut store = MockEntryStore::new();
        store.expect_get_entry().returning(|_| Ok(None));

        let clock = Arc::new(ManualClock::new(at(2)));
        let err = moderator(store, clock)
            .delete(DeleteRequest {
                entry_id: Uuid::now_v7(),
                viewer: Viewer::admin(UploaderId::from("staff")),
                confirmed: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(..)));
    }
}
