//! Hash directory: global depth plus one bucket address per slot.

use super::constants::{ADDRESS_SIZE, DIRECTORY_HEADER_SIZE, MAX_GLOBAL_DEPTH};
use crate::file;
use bytes::{Buf, BufMut, BytesMut};
use shelf_common::{Address, Result, ShelfError};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directory {
    pub global_depth: u8,
    /// `2^global_depth` bucket addresses.
    pub slots: Vec<Address>,
}

impl Directory {
    /// Builds a directory of depth `global_depth` from its slots.
    pub fn new(global_depth: u8, slots: Vec<Address>) -> Self {
        Self {
            global_depth,
            slots,
        }
    }

    /// Directory slot for `hash`: its low `global_depth` bits.
    #[inline]
    pub fn slot_of(&self, hash: u64) -> usize {
        (hash & Self::mask(self.global_depth)) as usize
    }

    #[inline]
    pub fn mask(depth: u8) -> u64 {
        (1u64 << depth) - 1
    }

    /// Appends a copy of every slot and increments the global depth.
    pub fn double(&mut self) {
        self.slots.extend_from_within(..);
        self.global_depth += 1;
    }

    /// Number of slots that reference `address`.
    pub fn references(&self, address: Address) -> usize {
        self.slots.iter().filter(|&&a| a == address).count()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf =
            BytesMut::with_capacity(DIRECTORY_HEADER_SIZE + self.slots.len() * ADDRESS_SIZE);
        buf.put_u8(self.global_depth);
        for &slot in &self.slots {
            buf.put_u64(slot);
        }
        buf.to_vec()
    }

    pub fn from_bytes(raw: &[u8], path: &Path) -> Result<Self> {
        let Some((&global_depth, mut body)) = raw.split_first() else {
            return Err(ShelfError::corrupted(path, "missing directory header"));
        };
        if global_depth > MAX_GLOBAL_DEPTH {
            return Err(ShelfError::corrupted(
                path,
                format!("global depth {global_depth} > {MAX_GLOBAL_DEPTH}"),
            ));
        }
        let expected = 1usize << global_depth;
        if body.len() != expected * ADDRESS_SIZE {
            return Err(ShelfError::corrupted(
                path,
                format!(
                    "directory of depth {global_depth} has {} bytes of slots",
                    body.len()
                ),
            ));
        }
        let mut slots = Vec::with_capacity(expected);
        for _ in 0..expected {
            slots.push(body.get_u64());
        }
        Ok(Self::new(global_depth, slots))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path)?;
        Self::from_bytes(&raw, path)
    }

    /// Rewrites the whole directory file.
    pub fn store(&self, path: &Path, fsync: bool) -> Result<()> {
        file::truncate(path)?;
        let mut f = file::open_rw(path)?;
        file::write_at(&mut f, 0, &self.to_bytes())?;
        file::sync(&f, fsync)
    }
}
