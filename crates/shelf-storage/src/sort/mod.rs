//! External merge sort of a record heap.
//!
//! A sort uses `2k` scratch files in the heap's naming scheme
//! (`<stem>.sort<n>.<ext>`). Run files reuse the heap's slot framing without
//! a header:
//!
//! ```text
//! branch 0: [run 0][run k][run 2k]...
//! branch 1: [run 1][run k+1]...
//! ...
//! ```
//!
//! Each merge pass reads one run from every input branch, merges them into
//! one output run, and deals output runs round-robin to the other `k` files.
//! The file sets then swap roles.

mod run;
mod selection;
mod sorter;

pub use sorter::{by_field, by_id, ExternalSorter, SortSummary};
