//! Fixed-size B+Tree page codec.

use super::constants::{ADDRESS_SIZE, PAGE_HEADER_SIZE};
use crate::file;
use bytes::{Buf, BufMut, BytesMut};
use shelf_common::{Address, IndexKey, Result, ShelfError, NO_ADDRESS};
use std::fs::File;
use std::path::Path;

/// A key slot. Leaves pair the key with a heap address; internal separators
/// carry `NO_ADDRESS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<K> {
    pub key: K,
    pub address: Address,
}

impl<K> Entry<K> {
    pub fn separator(key: K) -> Self {
        Self {
            key,
            address: NO_ADDRESS,
        }
    }
}

/// An owned, decoded B+Tree page.
///
/// Page layout (big-endian):
/// ```text
/// +---------------------------------+ 0
/// | order: i32                      |
/// | key_count: i32                  |
/// +---------------------------------+ 8 (PAGE_HEADER_SIZE)
/// | order * (key[WIDTH] + addr:u64) |
/// +---------------------------------+
/// | (order + 1) * child:u64         |  children[0] == -1 marks a leaf
/// +---------------------------------+
/// | next: u64                       |  leaf chain, -1 at the end
/// +---------------------------------+
/// ```
#[derive(Debug, Clone)]
pub struct BTreePage<K> {
    /// Byte offset of this page; `NO_ADDRESS` until first appended.
    pub address: Address,
    pub order: usize,
    pub entries: Vec<Entry<K>>,
    /// Child page addresses, `entries.len() + 1` of them. Empty for leaves.
    pub children: Vec<Address>,
    /// Next leaf in key order.
    pub next: Address,
}

impl<K: IndexKey> BTreePage<K> {
    pub fn new_leaf(order: usize) -> Self {
        Self {
            address: NO_ADDRESS,
            order,
            entries: Vec::with_capacity(order),
            children: Vec::new(),
            next: NO_ADDRESS,
        }
    }

    pub fn new_internal(order: usize) -> Self {
        Self {
            children: Vec::with_capacity(order + 1),
            ..Self::new_leaf(order)
        }
    }

    /// On-disk size of a page for the given order.
    pub fn byte_size(order: usize) -> usize {
        PAGE_HEADER_SIZE + order * (K::WIDTH + ADDRESS_SIZE) + (order + 1) * ADDRESS_SIZE
            + ADDRESS_SIZE
    }

    /// Fewest keys a non-root page may hold.
    #[inline]
    pub fn min_keys(order: usize) -> usize {
        (order + 1) / 2 - 1
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[inline]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_overfull(&self) -> bool {
        self.key_count() > self.order - 1
    }

    #[inline]
    pub fn is_underflow(&self) -> bool {
        self.key_count() < Self::min_keys(self.order)
    }

    /// True if a sibling can lend one entry and stay at or above the minimum.
    #[inline]
    pub fn can_borrow(&self) -> bool {
        self.key_count() > Self::min_keys(self.order)
    }

    /// Index of the child to descend into: the number of separators `<= key`.
    pub fn child_index(&self, key: &K) -> usize {
        self.entries.partition_point(|e| e.key <= *key)
    }

    /// Binary search for `key` among this page's entries.
    pub fn search(&self, key: &K) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.key.cmp(key))
    }

    /// Moves the upper half of an overfull page into a new right sibling.
    ///
    /// Returns the separator to promote. For leaves it is the right page's
    /// first key and the right page takes over the chain pointer; for
    /// internal pages the middle key moves up and is dropped from both halves.
    pub fn split(&mut self) -> (K, BTreePage<K>) {
        let mid = self.key_count() / 2;
        if self.is_leaf() {
            let mut right = Self::new_leaf(self.order);
            right.entries = self.entries.split_off(mid);
            right.next = self.next;
            let separator = right.entries[0].key.clone();
            (separator, right)
        } else {
            let mut right = Self::new_internal(self.order);
            right.entries = self.entries.split_off(mid + 1);
            right.children = self.children.split_off(mid + 1);
            // entries is non-empty here: an overfull page has at least two keys
            let promoted = self.entries.pop().map(|e| e.key).unwrap_or_else(K::empty);
            (promoted, right)
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::byte_size(self.order));
        buf.put_i32(self.order as i32);
        buf.put_i32(self.key_count() as i32);

        let mut key_buf = vec![0u8; K::WIDTH];
        for entry in &self.entries {
            entry.key.write_to(&mut key_buf);
            buf.put_slice(&key_buf);
            buf.put_u64(entry.address);
        }
        buf.put_bytes(0, (self.order - self.key_count()) * (K::WIDTH + ADDRESS_SIZE));

        for child in &self.children {
            buf.put_u64(*child);
        }
        for _ in self.children.len()..self.order + 1 {
            buf.put_u64(NO_ADDRESS);
        }
        buf.put_u64(self.next);
        buf.to_vec()
    }

    pub fn from_bytes(address: Address, order: usize, raw: &[u8], path: &Path) -> Result<Self> {
        if raw.len() != Self::byte_size(order) {
            return Err(ShelfError::corrupted(
                path,
                format!("page at {address} has {} bytes", raw.len()),
            ));
        }
        let mut buf = raw;
        let stored_order = buf.get_i32();
        let key_count = buf.get_i32();
        if stored_order as usize != order {
            return Err(ShelfError::corrupted(
                path,
                format!("page at {address} has order {stored_order}, expected {order}"),
            ));
        }
        if key_count < 0 || key_count as usize >= order {
            return Err(ShelfError::corrupted(
                path,
                format!("page at {address} has {key_count} keys"),
            ));
        }
        let key_count = key_count as usize;

        let mut entries = Vec::with_capacity(order);
        for _ in 0..key_count {
            let key = K::read_from(&buf[..K::WIDTH]);
            buf.advance(K::WIDTH);
            entries.push(Entry {
                key,
                address: buf.get_u64(),
            });
        }
        buf.advance((order - key_count) * (K::WIDTH + ADDRESS_SIZE));

        let first_child = buf.get_u64();
        let mut children = Vec::new();
        if first_child != NO_ADDRESS {
            children.reserve(order + 1);
            children.push(first_child);
            for _ in 0..key_count {
                children.push(buf.get_u64());
            }
            buf.advance((order - key_count) * ADDRESS_SIZE);
        } else {
            buf.advance(order * ADDRESS_SIZE);
        }
        let next = buf.get_u64();

        Ok(Self {
            address,
            order,
            entries,
            children,
            next,
        })
    }
}

/// Reads the page stored at `address`.
pub fn read_page<K: IndexKey>(
    f: &mut File,
    address: Address,
    order: usize,
    path: &Path,
) -> Result<BTreePage<K>> {
    let mut raw = vec![0u8; BTreePage::<K>::byte_size(order)];
    file::read_at(f, address, &mut raw)?;
    BTreePage::from_bytes(address, order, &raw, path)
}
