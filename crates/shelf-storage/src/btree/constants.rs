//! B+Tree file layout constants.

/// Size of the file header holding the root page address.
pub const FILE_HEADER_SIZE: u64 = 8;

/// Size of a page header (order + key count).
pub const PAGE_HEADER_SIZE: usize = 8;

/// Size of an encoded address (child pointer, next pointer, heap address).
pub const ADDRESS_SIZE: usize = 8;

/// Smallest supported order.
pub const MIN_ORDER: usize = 3;
