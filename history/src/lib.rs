//! TRCalc History
//!
//! Bounded log of completed conversions, newest first.

pub mod entry;
pub mod log;

pub use entry::HistoryEntry;
pub use log::{HistoryLog, HISTORY_CAPACITY};
