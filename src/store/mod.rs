//! Transactional state store.
//!
//! All ladder state lives in one [`Tables`] image guarded by a single async lock.
//! A unit of work runs against a private copy of the image; the copy replaces the
//! live image only when the work succeeds and the journal (if any) has durably
//! accepted the resulting row changes. A failure anywhere leaves the live image
//! exactly as it was.

pub mod journal;
pub mod tables;

pub use journal::{Journal, PgJournal};
pub use tables::{Change, Row, RowKey, Tables};

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::error::LadderError;

#[derive(Clone)]
pub struct Store {
    tables: Arc<Mutex<Tables>>,
    journal: Option<Arc<dyn Journal>>,
}

impl Store {
    /// Store that keeps state in memory only
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(Mutex::new(Tables::default())),
            journal: None,
        }
    }

    /// Store backed by a journal, primed with the journal's current contents
    pub async fn with_journal(journal: Arc<dyn Journal>) -> Result<Self, LadderError> {
        let tables = journal.load().await?;
        Ok(Self {
            tables: Arc::new(Mutex::new(tables)),
            journal: Some(journal),
        })
    }

    /// Runs `work` as one all-or-nothing unit.
    ///
    /// Units are serialized, so no two units ever observe each other's partial
    /// effects.
    pub async fn transaction<T, F>(&self, work: F) -> Result<T, LadderError>
    where
        F: FnOnce(&mut Tables) -> Result<T, LadderError> + Send,
        T: Send,
    {
        let mut live = self.tables.lock().await;
        let mut working = live.clone();

        let value = work(&mut working)?;

        if let Some(journal) = &self.journal {
            let changes = working.changes_since(&live);
            if !changes.is_empty() {
                if let Err(e) = journal.apply(&changes).await {
                    error!(error = %e, changes = changes.len(), "Failed to commit changes");
                    return Err(e);
                }
                debug!(changes = changes.len(), "Committed changes");
            }
        }

        *live = working;
        Ok(value)
    }

    /// Runs a read-only query against a consistent snapshot
    pub async fn read<T, F>(&self, query: F) -> T
    where
        F: FnOnce(&Tables) -> T,
    {
        let live = self.tables.lock().await;
        query(&live)
    }
}
