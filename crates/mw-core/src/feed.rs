//! # Live feed
//!
//! The realtime view model of the wall: a size-bounded, newest-first window
//! over the entry store that republishes itself whenever a change may fall
//! inside it.
//!
//! ```text
//!  EntryStore ──changes()──▶ feed task ──query_entries(limit)──▶ watch<FeedState>
//!                               ▲                                     │
//!                        load_more()                           snapshot()/changed()
//! ```
//!
//! Hidden entries are filtered again here before anything is published, so
//! they never reach a renderer even if a store returned one.

use crate::error::{AppError, Result};
use crate::models::{Entry, EntryChange, Viewer};
use crate::moderation::{delete_authority, DeleteAuthority};
use crate::traits::EntryStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the feed currently shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedState {
    /// Visible entries, newest first
    pub entries: Vec<Entry>,
    /// Current window size
    pub limit: usize,
    /// Last refresh error; previous entries are kept while set
    pub error: Option<String>,
}

/// An entry plus the viewer-specific state derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: Entry,
    pub delete: DeleteAuthority,
}

/// Derives per-entry delete affordances from the wall clock. Nothing here is stored.
pub fn project(entries: &[Entry], viewer: &Viewer, now: DateTime<Utc>, window: Duration) -> Vec<EntryView> {
    entries
        .iter()
        .filter(|e| !e.is_hidden)
        .map(|e| EntryView {
            entry: e.clone(),
            delete: delete_authority(e, viewer, now, window),
        })
        .collect()
}

pub struct LiveFeed {
    state: watch::Receiver<FeedState>,
    limit: watch::Sender<usize>,
    page_size: usize,
    task: JoinHandle<()>,
}

impl LiveFeed {
    /// Opens a live window of `page_size` entries.
    pub async fn subscribe(store: Arc<dyn EntryStore>, page_size: usize) -> Result<Self> {
        let page_size = page_size.max(1);

        // Listen before the first read so nothing slips between the two.
        let changes = store.changes();
        let initial = store
            .query_entries(page_size)
            .await
            .map_err(|e| AppError::Internal(format!("initial feed query failed: {e}")))?;

        let (state_tx, state_rx) = watch::channel(FeedState {
            entries: visible(initial),
            limit: page_size,
            error: None,
        });
        let (limit_tx, limit_rx) = watch::channel(page_size);
        let task = tokio::spawn(run(store, changes, state_tx, limit_rx));

        Ok(Self {
            state: state_rx,
            limit: limit_tx,
            page_size,
            task,
        })
    }

    pub fn snapshot(&self) -> FeedState {
        self.state.borrow().clone()
    }

    /// Waits until the feed publishes a new state.
    pub async fn changed(&mut self) -> Result<()> {
        self.state
            .changed()
            .await
            .map_err(|_| AppError::Internal("live feed stopped".into()))
    }

    /// A receiver over the published states, for streaming to a client.
    pub fn watch(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    /// Grows the window by one page and re-reads it.
    pub fn load_more(&self) {
        let step = self.page_size;
        self.limit.send_modify(|limit| *limit += step);
    }

    pub fn views(&self, viewer: &Viewer, now: DateTime<Utc>, window: Duration) -> Vec<EntryView> {
        project(&self.state.borrow().entries, viewer, now, window)
    }

    /// Stops listening to the store.
    pub fn unsubscribe(self) {}
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    store: Arc<dyn EntryStore>,
    mut changes: broadcast::Receiver<EntryChange>,
    state: watch::Sender<FeedState>,
    mut limit: watch::Receiver<usize>,
) {
    loop {
        let refresh = tokio::select! {
            change = changes.recv() => match change {
                Ok(change) => touches_window(&state, &change),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "feed lagged behind the store; re-reading window");
                    true
                }
                Err(RecvError::Closed) => break,
            },
            grown = limit.changed() => {
                if grown.is_err() {
                    break;
                }
                true
            }
            _ = state.closed() => break,
        };
        if !refresh {
            continue;
        }

        let window = *limit.borrow_and_update();
        match store.query_entries(window).await {
            Ok(entries) => {
                state.send_replace(FeedState {
                    entries: visible(entries),
                    limit: window,
                    error: None,
                });
            }
            Err(e) => {
                warn!(error = %e, "feed refresh failed; keeping previous entries");
                state.send_modify(|s| s.error = Some("The wall could not be refreshed.".into()));
            }
        }
    }
    debug!("live feed stopped");
}

/// Whether a change can alter what the current window shows.
fn touches_window(state: &watch::Sender<FeedState>, change: &EntryChange) -> bool {
    let current = state.borrow();
    match change {
        // New entries are always the newest.
        EntryChange::Added(_) => true,
        EntryChange::Updated(entry) => {
            if current.entries.len() < current.limit {
                return true;
            }
            if current.entries.iter().any(|e| e.id == entry.id) {
                return true;
            }
            current
                .entries
                .last()
                .map_or(true, |oldest| entry.created_at >= oldest.created_at)
        }
    }
}

fn visible(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.retain(|e| !e.is_hidden);
    entries
}
