//! Page-based B+Tree index over heap addresses.
//!
//! The index file starts with the address of the root page, followed by
//! fixed-size pages written at the byte offset that is their own address:
//!
//! ```text
//! +---------------------+ 0
//! | root: u64           |
//! +---------------------+ 8 (FILE_HEADER_SIZE)
//! | page                |
//! +---------------------+ 8 + page_size
//! | page                |
//! | ...                 |
//! ```
//!
//! Leaves are linked through `next` pointers so an ordered scan never
//! revisits internal pages. Pages released by merges are not reused.

pub mod constants;
mod cursor;
mod page;
mod tree;

pub use constants::MIN_ORDER;
pub use cursor::LeafCursor;
pub use page::{BTreePage, Entry};
pub use tree::BPlusTree;
