//! ShelfDB storage engine.
//!
//! This crate provides the file-resident storage components:
//! - Record heap: append-only, tombstoned slots keyed by byte address
//! - B+Tree index: ordered keys to heap addresses with a linked leaf chain
//! - Extensible hash index: directory-indirected buckets, optionally multi-valued
//! - External sort: k-way merge sort with fixed blocks or replacement selection
//!
//! Indexes are not updated by the heap. Callers apply heap changes to their
//! indexes, or rebuild an index from a heap replay.

mod file;
pub mod btree;
pub mod hash;
pub mod heap;
pub mod sort;

#[cfg(test)]
pub(crate) mod testing;

pub use btree::{BPlusTree, LeafCursor};
pub use hash::ExtensibleHash;
pub use heap::{HeapScan, RecordHeap, Slot, UpdateOutcome};
pub use sort::{by_field, by_id, ExternalSorter, SortSummary};
