//! # mw-db-sqlite
//!
//! SQLite implementation of `EntryStore`.
//!
//! Timestamps are stored as integer microseconds so ordering happens in SQL.
//! `seq` is the insertion counter that breaks `created_at` ties.
//! Change notifications are fanned out in-process; they do not cross
//! processes sharing the same database file.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mw_core::clock::{Clock, SystemClock};
use mw_core::models::{Entry, EntryChange, EntryPatch, MediaType, NewEntry, UploaderId};
use mw_core::traits::EntryStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const CHANGE_BUFFER: usize = 256;

const ENTRY_COLUMNS: &str = "id, media_url, media_type, mime_type, caption, created_at_us, \
                             uploader_id, rotation_hint, is_hidden, storage_key";

pub struct SqliteEntryStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<EntryChange>,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

fn blob_to_uuid(blob: &[u8]) -> anyhow::Result<Uuid> {
    Uuid::from_slice(blob).context("malformed entry id")
}

fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(us: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(us).with_context(|| format!("timestamp out of range: {us}"))
}

impl SqliteEntryStore {
    /// Connects and runs migrations. `sqlite::memory:` gets a single shared
    /// connection, since every in-memory connection is its own database.
    pub async fn new(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url: {url}"))?
            .create_if_missing(true);

        let in_memory = url.contains(":memory:");
        let mut pool = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { max_connections.max(1) });
        if in_memory {
            pool = pool.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run entry migrations")?;
        info!(url, "entry store ready");

        Ok(Self::from_pool(pool, Arc::new(SystemClock)))
    }

    pub fn from_pool(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { pool, clock, changes }
    }

    /// Replaces the clock used to stamp new entries.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self { clock, ..self }
    }

    /// Raw row lookup, hidden entries included.
    pub async fn record(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?"))
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_entry).transpose()
    }

    fn publish(&self, change: EntryChange) {
        let _ = self.changes.send(change);
    }
}

fn map_entry(row: &SqliteRow) -> anyhow::Result<Entry> {
    let media_type: String = row.try_get("media_type")?;
    Ok(Entry {
        id: blob_to_uuid(row.try_get::<Vec<u8>, _>("id")?.as_slice())?,
        media_url: row.try_get("media_url")?,
        media_type: MediaType::from_str(&media_type).map_err(anyhow::Error::msg)?,
        mime_type: row.try_get("mime_type")?,
        caption: row.try_get("caption")?,
        created_at: from_micros(row.try_get("created_at_us")?)?,
        uploader_id: UploaderId::from(row.try_get::<String, _>("uploader_id")?),
        rotation_hint: row.try_get::<f64, _>("rotation_hint")? as f32,
        is_hidden: row.try_get("is_hidden")?,
        storage_key: row.try_get("storage_key")?,
    })
}

#[async_trait]
impl EntryStore for SqliteEntryStore {
    async fn add_entry(&self, new: NewEntry) -> anyhow::Result<Entry> {
        // Stamp at storage precision so the returned entry matches later reads.
        let created_at = from_micros(to_micros(self.clock.now()))?;
        let entry = Entry {
            id: Uuid::now_v7(),
            media_url: new.media_url,
            media_type: new.media_type,
            mime_type: new.mime_type,
            caption: new.caption,
            created_at,
            uploader_id: new.uploader_id,
            rotation_hint: new.rotation_hint,
            is_hidden: false,
            storage_key: new.storage_key,
        };

        sqlx::query(&format!(
            "INSERT INTO entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(uuid_to_blob(entry.id))
        .bind(&entry.media_url)
        .bind(entry.media_type.as_str())
        .bind(&entry.mime_type)
        .bind(&entry.caption)
        .bind(to_micros(entry.created_at))
        .bind(entry.uploader_id.as_str())
        .bind(f64::from(entry.rotation_hint))
        .bind(false)
        .bind(&entry.storage_key)
        .execute(&self.pool)
        .await
        .context("Failed to insert entry")?;

        debug!(id = %entry.id, "entry added");
        self.publish(EntryChange::Added(entry.clone()));
        Ok(entry)
    }

    /// Only the hidden flag can change, and only from visible to hidden.
    async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> anyhow::Result<Entry> {
        let current = self
            .record(id)
            .await?
            .with_context(|| format!("entry {id} not found"))?;

        match patch.is_hidden {
            Some(false) if current.is_hidden => anyhow::bail!("hidden entries cannot be restored"),
            Some(true) if !current.is_hidden => {}
            _ => return Ok(current),
        }

        let result = sqlx::query("UPDATE entries SET is_hidden = 1 WHERE id = ? AND is_hidden = 0")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .context("Failed to hide entry")?;

        let entry = Entry {
            is_hidden: true,
            ..current
        };
        // A concurrent hide already announced it.
        if result.rows_affected() == 1 {
            debug!(id = %id, "entry hidden");
            self.publish(EntryChange::Updated(entry.clone()));
        }
        Ok(entry)
    }

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        let row = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ? AND is_hidden = 0"
        ))
        .bind(uuid_to_blob(id))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_entry).transpose()
    }

    async fn query_entries(&self, limit: usize) -> anyhow::Result<Vec<Entry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE is_hidden = 0 \
             ORDER BY created_at_us DESC, seq DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_entry).collect()
    }

    fn changes(&self) -> broadcast::Receiver<EntryChange> {
        self.changes.subscribe()
    }
}
