//! TRCalc Common Types
//!
//! This crate contains shared types used across the TRCalc engine,
//! including currencies, bounded amounts, identifiers and the key-value
//! persistence contract.

pub mod currency;
pub mod identifiers;
pub mod error;
pub mod store;
pub mod time;

pub use currency::*;
pub use identifiers::*;
pub use error::*;
pub use store::{KeyValueStore, MemoryStore, FileStore, Versioned};
pub use time::*;
