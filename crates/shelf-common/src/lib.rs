//! ShelfDB common types, errors, and utilities.
//!
//! This crate provides shared definitions used by the storage components:
//! the error taxonomy, the store configuration, the record codec contract
//! and the fixed-width key codecs used by the indexes.

pub mod address;
pub mod config;
pub mod error;
pub mod key;
pub mod record;

pub use address::{Address, NO_ADDRESS};
pub use config::{require_extension, scratch_path_in, SortStrategy, StoreConfig};
pub use error::{Result, ShelfError};
pub use key::{FixedString, IndexKey};
pub use record::{FieldValue, Record, UNASSIGNED_ID};
