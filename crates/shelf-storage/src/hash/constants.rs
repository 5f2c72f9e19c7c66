//! Extensible hash file layout constants.

/// Size of the directory header (global depth, u8).
pub const DIRECTORY_HEADER_SIZE: usize = 1;

/// Size of a bucket header: local depth byte plus i32 entry count.
pub const BUCKET_HEADER_SIZE: usize = 5;

/// Size of an encoded address.
pub const ADDRESS_SIZE: usize = 8;

/// Global depth of a freshly created index (two buckets).
pub const INITIAL_GLOBAL_DEPTH: u8 = 1;

/// Largest global depth the directory may grow to.
pub const MAX_GLOBAL_DEPTH: u8 = 32;
