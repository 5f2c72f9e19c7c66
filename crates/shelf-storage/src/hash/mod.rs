//! Extensible hash index over heap addresses.
//!
//! Two files back each index. The directory file is rewritten whole on every
//! change; buckets are fixed-size and updated in place by address.
//!
//! ```text
//! directory file                 bucket file
//! +---------------------+ 0      +---------------------------+ 0
//! | global_depth: u8    |        | bucket                    |
//! +---------------------+ 1      +---------------------------+ bucket_size
//! | 2^global_depth      |  --->  | bucket                    |
//! |   * address: u64    |        | ...                       |
//! +---------------------+        +---------------------------+
//! ```
//!
//! A key's slot is the low `global_depth` bits of the xxh3 hash of its
//! fixed-width encoding.

pub mod constants;
mod bucket;
mod directory;
mod index;

pub use bucket::{Bucket, BucketEntry};
pub use directory::Directory;
pub use index::{hash_key, ExtensibleHash};
