//! Bounded, most-recent-first history log.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;
use trcalc_common::store::{keys, Versioned};

use crate::entry::HistoryEntry;

/// Maximum number of entries kept.
pub const HISTORY_CAPACITY: usize = 50;

/// Completed conversions, newest first. Appending past capacity evicts the
/// oldest entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<HistoryEntry>", into = "Vec<HistoryEntry>")]
pub struct HistoryLog {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a persisted list (newest first), keeping at most
    /// [`HISTORY_CAPACITY`] entries.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut entries = VecDeque::from(entries);
        if entries.len() > HISTORY_CAPACITY {
            debug!(
                persisted = entries.len(),
                capacity = HISTORY_CAPACITY,
                "Truncating restored history"
            );
            entries.truncate(HISTORY_CAPACITY);
        }
        Self { entries }
    }

    /// Prepend an entry, evicting from the tail past capacity.
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Copy of the entries, newest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }
}

impl From<Vec<HistoryEntry>> for HistoryLog {
    fn from(entries: Vec<HistoryEntry>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<HistoryLog> for Vec<HistoryEntry> {
    fn from(log: HistoryLog) -> Self {
        log.entries.into()
    }
}

impl Versioned for HistoryLog {
    const KEY: &'static str = keys::HISTORY;
    const VERSION: u32 = 1;
}
