//! Slot framing shared by heap files and sort run files.

use super::constants::{SLOT_DEAD, SLOT_HEADER_SIZE, SLOT_LIVE};
use bytes::{Buf, BufMut, BytesMut};
use shelf_common::{Address, Result, ShelfError};
use std::io::{ErrorKind, Read};
use std::path::Path;

/// A decoded heap slot.
#[derive(Debug, Clone)]
pub struct Slot<T> {
    /// Byte offset of the slot header.
    pub address: Address,
    /// False once the slot has been tombstoned.
    pub live: bool,
    /// Payload length reserved for this slot.
    pub capacity: u32,
    /// The decoded payload.
    pub record: T,
}

/// Header of a slot as stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotHeader {
    pub live: bool,
    pub len: u32,
}

impl SlotHeader {
    /// Fails with `Corrupted` on a negative payload length.
    pub fn from_bytes(mut buf: &[u8], path: &Path) -> Result<Self> {
        let live = buf.get_u8() != SLOT_DEAD;
        let len = buf.get_i32();
        let len = u32::try_from(len)
            .map_err(|_| ShelfError::corrupted(path, format!("negative slot length {len}")))?;
        Ok(Self { live, len })
    }
}

/// Frames `payload` as a live slot.
pub(crate) fn encode_slot(payload: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(SLOT_HEADER_SIZE + payload.len());
    buf.put_u8(SLOT_LIVE);
    buf.put_i32(payload.len() as i32);
    buf.put_slice(payload);
    buf.to_vec()
}

/// Reads one slot from a sequential reader.
///
/// Returns `None` on a clean end of file. A slot cut short by end of file
/// is reported as corruption of `path`.
pub(crate) fn read_slot(
    reader: &mut impl Read,
    path: &Path,
) -> Result<Option<(SlotHeader, Vec<u8>)>> {
    let mut header = [0u8; SLOT_HEADER_SIZE];
    let mut filled = 0;
    while filled < SLOT_HEADER_SIZE {
        match reader.read(&mut header[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ShelfError::corrupted(path, "truncated slot header")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let header = SlotHeader::from_bytes(&header, path)?;
    // The buffer grows with the bytes actually present, never to the stored length.
    let mut payload = Vec::new();
    reader
        .take(u64::from(header.len))
        .read_to_end(&mut payload)?;
    if payload.len() != header.len as usize {
        return Err(ShelfError::corrupted(
            path,
            format!(
                "slot payload of {} bytes cut short at {}",
                header.len,
                payload.len()
            ),
        ));
    }
    Ok(Some((header, payload)))
}
