//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use crate::models::{Entry, EntryChange, EntryPatch, NewEntry};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Persistence and change-notification contract for guestbook entries.
///
/// Reads never return hidden entries. Ordering is `created_at` descending,
/// ties broken by insertion order (latest insertion first).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Stores a new entry. The store assigns `id`, `created_at` and `is_hidden = false`.
    async fn add_entry(&self, entry: NewEntry) -> anyhow::Result<Entry>;

    /// Applies a moderation patch. Unhiding is rejected.
    async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> anyhow::Result<Entry>;

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<Entry>>;

    /// Newest visible entries, at most `limit` of them.
    async fn query_entries(&self, limit: usize) -> anyhow::Result<Vec<Entry>>;

    /// Subscribes to every subsequent add and update.
    fn changes(&self) -> broadcast::Receiver<EntryChange>;
}

/// Media storage contract for uploaded photos and videos.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Saves raw bytes under `key` and returns a URL the blob can be fetched from.
    async fn put_blob(&self, key: &str, data: Bytes, content_type: &str) -> anyhow::Result<String>;
}

/// Admin elevation contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verifies staff/admin credentials
    async fn check_credentials(&self, username: &str, password: &str) -> bool;
}
