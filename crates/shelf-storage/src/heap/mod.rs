//! Record heap implementation.
//!
//! The heap is the system of record: an append-only file of tombstoned,
//! length-prefixed slots behind a 4-byte header holding the last assigned
//! identifier.
//!
//! ```text
//! +-------------------+ 0
//! | last_id: i32      |
//! +-------------------+ 4 (HEADER_SIZE)
//! | live: u8          |
//! | len: i32          |
//! | payload[len]      |
//! +-------------------+
//! | ... more slots    |
//! +-------------------+
//! ```
//!
//! All integers are big-endian.

pub mod constants;
mod file;
mod slot;

pub use file::{HeapScan, RecordHeap, UpdateOutcome};
pub use slot::Slot;
pub(crate) use slot::{encode_slot, read_slot};
