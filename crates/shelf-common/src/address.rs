//! Byte-offset addresses shared by the heap and the indexes.

/// Byte offset into a heap, index or bucket file.
///
/// Addresses are the values stored by every index and the join key
/// between an index entry and its heap slot.
pub type Address = u64;

/// Sentinel for "no address" (encoded on disk as `-1`).
pub const NO_ADDRESS: Address = u64::MAX;
