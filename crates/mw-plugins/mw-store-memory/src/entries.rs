use async_trait::async_trait;
use mw_core::clock::{Clock, SystemClock};
use mw_core::models::{Entry, EntryChange, EntryPatch, NewEntry};
use mw_core::traits::EntryStore;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

const CHANGE_BUFFER: usize = 256;

struct Row {
    seq: u64,
    entry: Entry,
}

#[derive(Default)]
struct Table {
    next_seq: u64,
    rows: Vec<Row>,
}

pub struct MemoryEntryStore {
    table: RwLock<Table>,
    clock: Arc<dyn Clock>,
    changes: broadcast::Sender<EntryChange>,
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Stamps `created_at` from `clock` instead of the system time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            table: RwLock::new(Table::default()),
            clock,
            changes,
        }
    }

    /// Raw row lookup, hidden entries included.
    pub async fn record(&self, id: Uuid) -> Option<Entry> {
        let table = self.table.read().await;
        table.rows.iter().find(|r| r.entry.id == id).map(|r| r.entry.clone())
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn publish(&self, change: EntryChange) {
        // No receivers is fine; nobody is watching the wall yet.
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn add_entry(&self, new: NewEntry) -> anyhow::Result<Entry> {
        let entry = Entry {
            id: Uuid::now_v7(),
            media_url: new.media_url,
            media_type: new.media_type,
            mime_type: new.mime_type,
            caption: new.caption,
            created_at: self.clock.now(),
            uploader_id: new.uploader_id,
            rotation_hint: new.rotation_hint,
            is_hidden: false,
            storage_key: new.storage_key,
        };

        {
            let mut table = self.table.write().await;
            let seq = table.next_seq;
            table.next_seq += 1;
            table.rows.push(Row {
                seq,
                entry: entry.clone(),
            });
        }
        debug!(id = %entry.id, "entry added");
        self.publish(EntryChange::Added(entry.clone()));
        Ok(entry)
    }

    async fn update_entry(&self, id: Uuid, patch: EntryPatch) -> anyhow::Result<Entry> {
        let entry = {
            let mut table = self.table.write().await;
            let row = table
                .rows
                .iter_mut()
                .find(|r| r.entry.id == id)
                .ok_or_else(|| anyhow::anyhow!("entry {id} not found"))?;

            match patch.is_hidden {
                Some(false) if row.entry.is_hidden => anyhow::bail!("hidden entries cannot be restored"),
                Some(true) if !row.entry.is_hidden => {
                    row.entry.is_hidden = true;
                    row.entry.clone()
                }
                _ => return Ok(row.entry.clone()),
            }
        };

        debug!(id = %entry.id, "entry hidden");
        self.publish(EntryChange::Updated(entry.clone()));
        Ok(entry)
    }

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<Entry>> {
        Ok(self.record(id).await.filter(|e| !e.is_hidden))
    }

    async fn query_entries(&self, limit: usize) -> anyhow::Result<Vec<Entry>> {
        let table = self.table.read().await;
        let mut visible: Vec<&Row> = table.rows.iter().filter(|r| !r.entry.is_hidden).collect();
        visible.sort_by(|a, b| {
            b.entry
                .created_at
                .cmp(&a.entry.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        Ok(visible.into_iter().take(limit).map(|r| r.entry.clone()).collect())
    }

    fn changes(&self) -> broadcast::Receiver<EntryChange> {
        self.changes.subscribe()
    }
}
