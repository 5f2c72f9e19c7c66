//! Heap file layout constants.

/// Size of the file header (last assigned identifier, i32) in bytes.
pub const HEADER_SIZE: u64 = 4;

/// Size of a slot header: tombstone byte plus i32 payload length.
pub const SLOT_HEADER_SIZE: usize = 5;

/// Tombstone byte of a live slot.
pub const SLOT_LIVE: u8 = 1;

/// Tombstone byte of a logically deleted slot.
pub const SLOT_DEAD: u8 = 0;
