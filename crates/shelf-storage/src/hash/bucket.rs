//! Fixed-capacity hash bucket codec.

use super::constants::{ADDRESS_SIZE, BUCKET_HEADER_SIZE};
use crate::file;
use bytes::{Buf, BufMut, BytesMut};
use shelf_common::{Address, IndexKey, Result, ShelfError, NO_ADDRESS};
use std::fs::File;
use std::path::Path;

/// A `(key, heap address)` pair stored in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry<K> {
    pub key: K,
    pub value: Address,
}

/// An owned, decoded bucket.
///
/// Bucket layout (big-endian):
/// ```text
/// +------------------------------------+ 0
/// | local_depth: u8                    |
/// | size: i32                          |
/// +------------------------------------+ 5 (BUCKET_HEADER_SIZE)
/// | capacity * (key[WIDTH] + value:u64) |
/// +------------------------------------+
/// ```
///
/// Entries are kept sorted by key, then value.
#[derive(Debug, Clone)]
pub struct Bucket<K> {
    /// Byte offset in the bucket file; `NO_ADDRESS` until first appended.
    pub address: Address,
    pub local_depth: u8,
    pub capacity: usize,
    pub entries: Vec<BucketEntry<K>>,
}

impl<K: IndexKey> Bucket<K> {
    pub fn new(capacity: usize, local_depth: u8) -> Self {
        Self {
            address: NO_ADDRESS,
            local_depth,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// On-disk size of a bucket holding `capacity` entries.
    pub fn byte_size(capacity: usize) -> usize {
        BUCKET_HEADER_SIZE + capacity * (K::WIDTH + ADDRESS_SIZE)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Inserts `entry` at its sorted position.
    pub fn insert_sorted(&mut self, entry: BucketEntry<K>) {
        let pos = self
            .entries
            .partition_point(|e| (&e.key, e.value) < (&entry.key, entry.value));
        self.entries.insert(pos, entry);
    }

    /// Restores key order after values were rewritten.
    pub fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| a.key.cmp(&b.key).then(a.value.cmp(&b.value)));
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.iter().any(|e| e.key == *key)
    }

    pub fn contains_pair(&self, key: &K, value: Address) -> bool {
        self.entries.iter().any(|e| e.key == *key && e.value == value)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::byte_size(self.capacity));
        buf.put_u8(self.local_depth);
        buf.put_i32(self.entries.len() as i32);

        let mut key_buf = vec![0u8; K::WIDTH];
        for entry in &self.entries {
            entry.key.write_to(&mut key_buf);
            buf.put_slice(&key_buf);
            buf.put_u64(entry.value);
        }
        buf.put_bytes(
            0,
            (self.capacity - self.entries.len()) * (K::WIDTH + ADDRESS_SIZE),
        );
        buf.to_vec()
    }

    pub fn from_bytes(address: Address, capacity: usize, raw: &[u8], path: &Path) -> Result<Self> {
        if raw.len() != Self::byte_size(capacity) {
            return Err(ShelfError::corrupted(
                path,
                format!("bucket at {address} has {} bytes", raw.len()),
            ));
        }
        let mut buf = raw;
        let local_depth = buf.get_u8();
        let size = buf.get_i32();
        if size < 0 || size as usize > capacity {
            return Err(ShelfError::corrupted(
                path,
                format!("bucket at {address} holds {size} entries, capacity {capacity}"),
            ));
        }

        let mut entries = Vec::with_capacity(capacity);
        for _ in 0..size {
            let key = K::read_from(&buf[..K::WIDTH]);
            buf.advance(K::WIDTH);
            entries.push(BucketEntry {
                key,
                value: buf.get_u64(),
            });
        }
        Ok(Self {
            address,
            local_depth,
            capacity,
            entries,
        })
    }
}

/// Reads the bucket stored at `address`.
pub fn read_bucket<K: IndexKey>(
    f: &mut File,
    address: Address,
    capacity: usize,
    path: &Path,
) -> Result<Bucket<K>> {
    let mut raw = vec![0u8; Bucket::<K>::byte_size(capacity)];
    file::read_at(f, address, &mut raw)?;
    Bucket::from_bytes(address, capacity, &raw, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: u32, value: Address) -> BucketEntry<u32> {
        BucketEntry { key, value }
    }

    #[test]
    fn test_bucket_size() {
        // 5 header + 3 * (4 + 8)
        assert_eq!(Bucket::<u32>::byte_size(3), 41);
    }

    #[test]
    fn test_bucket_sorted_insert() {
        let mut bucket = Bucket::new(4, 1);
        bucket.insert_sorted(entry(9, 1));
        bucket.insert_sorted(entry(2, 7));
        bucket.insert_sorted(entry(2, 3));
        let got: Vec<_> = bucket.entries.iter().map(|e| (e.key, e.value)).collect();
        assert_eq!(got, vec![(2, 3), (2, 7), (9, 1)]);
        assert!(!bucket.is_full());
        bucket.insert_sorted(entry(5, 0));
        assert!(bucket.is_full());
    }

    #[test]
    fn test_bucket_roundtrip() {
        let mut bucket = Bucket::new(3, 4);
        bucket.insert_sorted(entry(11, 100));
        bucket.insert_sorted(entry(3, 200));
        let bytes = bucket.to_bytes();
        assert_eq!(bytes.len(), Bucket::<u32>::byte_size(3));

        let decoded = Bucket::<u32>::from_bytes(41, 3, &bytes, Path::new("b.db")).unwrap();
        assert_eq!(decoded.address, 41);
        assert_eq!(decoded.local_depth, 4);
        assert_eq!(decoded.entries, bucket.entries);
    }

    #[test]
    fn test_bucket_oversized_count_is_corruption() {
        let mut bytes = Bucket::<u32>::new(2, 0).to_bytes();
        bytes[1..5].copy_from_slice(&3i32.to_be_bytes());
        assert!(matches!(
            Bucket::<u32>::from_bytes(0, 2, &bytes, Path::new("b.db")),
            Err(ShelfError::Corrupted { .. })
        ));
    }
}
