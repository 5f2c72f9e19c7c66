//! ExtensibleHash: directory-indirected bucket hashing over heap addresses.

use super::bucket::{read_bucket, Bucket, BucketEntry};
use super::constants::{INITIAL_GLOBAL_DEPTH, MAX_GLOBAL_DEPTH};
use super::directory::Directory;
use crate::file;
use crate::heap::RecordHeap;
use shelf_common::{
    require_extension, Address, IndexKey, Record, Result, ShelfError, StoreConfig,
};
use std::collections::HashMap;
use std::fs::File;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

/// Hash of a key's fixed-width encoding.
#[inline]
pub fn hash_key<K: IndexKey>(key: &K) -> u64 {
    xxh3_64(&key.to_key_bytes())
}

/// Extensible hash index stored in a directory file and a bucket file.
///
/// In unique mode each key maps to one address. In redundant mode a key may
/// map to several addresses, but each `(key, address)` pair is stored once.
/// Buckets are never merged and the directory never shrinks.
pub struct ExtensibleHash<K> {
    dir_path: PathBuf,
    bucket_path: PathBuf,
    capacity: usize,
    redundant: bool,
    fsync: bool,
    _key: PhantomData<K>,
}

impl<K: IndexKey> ExtensibleHash<K> {
    /// Opens the index, initializing both files if the directory is new.
    pub fn new(
        dir_path: impl Into<PathBuf>,
        bucket_path: impl Into<PathBuf>,
        capacity: usize,
        redundant: bool,
    ) -> Result<Self> {
        let dir_path = dir_path.into();
        let bucket_path = bucket_path.into();
        require_extension(&dir_path)?;
        require_extension(&bucket_path)?;
        if capacity < 1 {
            return Err(ShelfError::InvalidConfiguration(
                "hash bucket capacity must be at least 1".to_string(),
            ));
        }

        let index = Self {
            dir_path,
            bucket_path,
            capacity,
            redundant,
            fsync: false,
            _key: PhantomData,
        };
        let has_directory =
            index.dir_path.exists() && std::fs::metadata(&index.dir_path)?.len() > 0;
        if has_directory {
            index.check_bucket_file()?;
        } else {
            index.initialize()?;
        }
        Ok(index)
    }

    /// Opens the index called `name` under the configured data directory.
    pub fn with_config(config: &StoreConfig, name: &str, redundant: bool) -> Result<Self> {
        config.validate()?;
        let (dir_path, bucket_path) = config.hash_paths(name);
        let mut index = Self::new(dir_path, bucket_path, config.hash_bucket_capacity, redundant)?;
        index.fsync = config.fsync_enabled;
        Ok(index)
    }

    pub fn directory_path(&self) -> &Path {
        &self.dir_path
    }

    pub fn bucket_path(&self) -> &Path {
        &self.bucket_path
    }

    #[inline]
    pub fn is_redundant(&self) -> bool {
        self.redundant
    }

    fn initialize(&self) -> Result<()> {
        file::truncate(&self.bucket_path)?;
        let mut f = file::open_rw(&self.bucket_path)?;
        let mut slots = Vec::with_capacity(1 << INITIAL_GLOBAL_DEPTH);
        for _ in 0..1u64 << INITIAL_GLOBAL_DEPTH {
            let mut bucket = Bucket::<K>::new(self.capacity, INITIAL_GLOBAL_DEPTH);
            slots.push(self.append(&mut f, &mut bucket)?);
        }
        file::sync(&f, self.fsync)?;
        Directory::new(INITIAL_GLOBAL_DEPTH, slots).store(&self.dir_path, self.fsync)
    }

    fn check_bucket_file(&self) -> Result<()> {
        let size = Bucket::<K>::byte_size(self.capacity) as u64;
        let len = std::fs::metadata(&self.bucket_path)?.len();
        if len == 0 || len % size != 0 {
            return Err(ShelfError::corrupted(
                &self.bucket_path,
                format!("{len} bytes is not a whole number of {size}-byte buckets"),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Bucket I/O
    // =========================================================================

    fn read(&self, f: &mut File, address: Address) -> Result<Bucket<K>> {
        read_bucket(f, address, self.capacity, &self.bucket_path)
    }

    fn write(&self, f: &mut File, bucket: &Bucket<K>) -> Result<()> {
        file::write_at(f, bucket.address, &bucket.to_bytes())
    }

    fn append(&self, f: &mut File, bucket: &mut Bucket<K>) -> Result<Address> {
        bucket.address = file::append(f, &bucket.to_bytes())?;
        Ok(bucket.address)
    }

    /// Loads the directory and the bucket `key` hashes to.
    fn locate(&self, f: &mut File, key: &K) -> Result<Bucket<K>> {
        let dir = Directory::load(&self.dir_path)?;
        let address = dir.slots[dir.slot_of(hash_key(key))];
        self.read(f, address)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the first address stored for `key`.
    pub fn get(&self, key: &K) -> Result<Option<Address>> {
        let mut f = file::open_rw(&self.bucket_path)?;
        let bucket = self.locate(&mut f, key)?;
        Ok(bucket.entries.iter().find(|e| e.key == *key).map(|e| e.value))
    }

    /// Returns every address stored for `key`, in ascending order.
    pub fn get_all(&self, key: &K) -> Result<Vec<Address>> {
        let mut f = file::open_rw(&self.bucket_path)?;
        let bucket = self.locate(&mut f, key)?;
        Ok(bucket
            .entries
            .iter()
            .filter(|e| e.key == *key)
            .map(|e| e.value)
            .collect())
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    pub fn global_depth(&self) -> Result<u8> {
        Ok(Directory::load(&self.dir_path)?.global_depth)
    }

    /// Number of distinct buckets in use.
    pub fn bucket_count(&self) -> Result<usize> {
        let mut slots = Directory::load(&self.dir_path)?.slots;
        slots.sort_unstable();
        slots.dedup();
        Ok(slots.len())
    }

    /// Number of stored entries.
    pub fn len(&self) -> Result<usize> {
        let mut slots = Directory::load(&self.dir_path)?.slots;
        slots.sort_unstable();
        slots.dedup();
        let mut f = file::open_rw(&self.bucket_path)?;
        let mut total = 0;
        for address in slots {
            total += self.read(&mut f, address)?.entries.len();
        }
        Ok(total)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts `key -> value`.
    ///
    /// Fails with `DuplicateKey` if the key (unique mode) or the pair
    /// (redundant mode) is already present, and with `BucketOverflow` if the
    /// full target bucket cannot be separated by splitting. Both leave the
    /// index unchanged.
    pub fn insert(&mut self, key: K, value: Address) -> Result<()> {
        let mut dir = Directory::load(&self.dir_path)?;
        let mut f = file::open_rw(&self.bucket_path)?;
        let entry = BucketEntry { key, value };

        let bucket = self.read(&mut f, dir.slots[dir.slot_of(hash_key(&entry.key))])?;
        let duplicate = if self.redundant {
            bucket.contains_pair(&entry.key, entry.value)
        } else {
            bucket.contains_key(&entry.key)
        };
        if duplicate {
            return Err(ShelfError::DuplicateKey);
        }
        if bucket.is_full() {
            Self::check_separable(&bucket, &entry)?;
        }

        if self.insert_entry(&mut f, &mut dir, entry)? {
            dir.store(&self.dir_path, self.fsync)?;
        }
        file::sync(&f, self.fsync)
    }

    /// Fails unless some bit below `MAX_GLOBAL_DEPTH` tells the entries of a
    /// full bucket apart from each other or from `entry`.
    fn check_separable(bucket: &Bucket<K>, entry: &BucketEntry<K>) -> Result<()> {
        let mask = Directory::mask(MAX_GLOBAL_DEPTH);
        let hash = hash_key(&entry.key) & mask;
        if bucket.entries.iter().all(|e| hash_key(&e.key) & mask == hash) {
            return Err(ShelfError::BucketOverflow {
                depth: bucket.local_depth,
            });
        }
        Ok(())
    }

    /// Places `entry`, splitting full buckets as needed. Returns true if the
    /// directory changed and must be stored.
    fn insert_entry(
        &self,
        f: &mut File,
        dir: &mut Directory,
        entry: BucketEntry<K>,
    ) -> Result<bool> {
        let hash = hash_key(&entry.key);
        let mut bucket = self.read(f, dir.slots[dir.slot_of(hash)])?;
        if !bucket.is_full() {
            bucket.insert_sorted(entry);
            self.write(f, &bucket)?;
            return Ok(false);
        }

        let old_depth = bucket.local_depth;
        if old_depth >= MAX_GLOBAL_DEPTH {
            return Err(ShelfError::BucketOverflow { depth: old_depth });
        }
        if old_depth == dir.global_depth {
            dir.double();
            debug!(global_depth = dir.global_depth, "hash directory doubled");
        }

        let new_depth = old_depth + 1;
        let mut low = Bucket::new(self.capacity, new_depth);
        low.address = bucket.address;
        self.write(f, &low)?;
        let mut high = Bucket::new(self.capacity, new_depth);
        let high_address = self.append(f, &mut high)?;

        // Slots sharing the old bucket's low `old_depth` bits, stride apart;
        // those with bit `old_depth` set move to the new bucket.
        let stride = 1usize << old_depth;
        let start = (hash & Directory::mask(old_depth)) as usize;
        for j in (start..dir.slots.len()).step_by(stride) {
            if (j >> old_depth) & 1 == 1 {
                dir.slots[j] = high_address;
            }
        }
        debug!(
            bucket = bucket.address,
            sibling = high_address,
            local_depth = new_depth,
            "hash bucket split"
        );

        for old in bucket.entries {
            self.insert_entry(f, dir, old)?;
        }
        self.insert_entry(f, dir, entry)?;
        Ok(true)
    }

    // =========================================================================
    // Update / Delete
    // =========================================================================

    /// Rewrites the address of the first entry for `key`.
    pub fn update(&mut self, key: &K, value: Address) -> Result<bool> {
        self.modify(key, None, Some(value))
    }

    /// Rewrites `old` to `new` for `key`. Intended for redundant indexes.
    pub fn update_value(&mut self, key: &K, old: Address, new: Address) -> Result<bool> {
        self.modify(key, Some(old), Some(new))
    }

    /// Removes every entry for `key`.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        let mut f = file::open_rw(&self.bucket_path)?;
        let mut bucket = self.locate(&mut f, key)?;
        let before = bucket.entries.len();
        bucket.entries.retain(|e| e.key != *key);
        if bucket.entries.len() == before {
            return Ok(false);
        }
        self.write(&mut f, &bucket)?;
        file::sync(&f, self.fsync)?;
        Ok(true)
    }

    /// Removes the single `(key, value)` pair.
    pub fn delete_value(&mut self, key: &K, value: Address) -> Result<bool> {
        self.modify(key, Some(value), None)
    }

    /// Finds the entry for `key` (and `value`, if given), then replaces its
    /// value with `new` or removes it when `new` is `None`.
    fn modify(&mut self, key: &K, value: Option<Address>, new: Option<Address>) -> Result<bool> {
        let mut f = file::open_rw(&self.bucket_path)?;
        let mut bucket = self.locate(&mut f, key)?;
        let Some(pos) = bucket
            .entries
            .iter()
            .position(|e| e.key == *key && value.map_or(true, |v| e.value == v))
        else {
            return Ok(false);
        };

        match new {
            Some(new) => {
                let clashes = bucket.entries[pos].value != new && bucket.contains_pair(key, new);
                if self.redundant && clashes {
                    return Err(ShelfError::DuplicateKey);
                }
                bucket.entries[pos].value = new;
                bucket.sort();
            }
            None => {
                bucket.entries.remove(pos);
            }
        }
        self.write(&mut f, &bucket)?;
        file::sync(&f, self.fsync)?;
        Ok(true)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Truncates both files and re-initializes an empty index.
    pub fn clear(&mut self) -> Result<()> {
        self.initialize()
    }

    /// Clears the index and inserts `key_of(record)` for every live heap record.
    pub fn rebuild_from<T, F>(&mut self, heap: &RecordHeap<T>, key_of: F) -> Result<usize>
    where
        T: Record,
        F: Fn(&T) -> K,
    {
        self.clear()?;
        let scan = match heap.scan() {
            Ok(scan) => scan,
            Err(ShelfError::EmptyStore { .. }) => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for slot in scan {
            let slot = slot?;
            self.insert(key_of(&slot.record), slot.address)?;
            count += 1;
        }
        debug!(path = %self.dir_path.display(), count, "hash index rebuilt from heap");
        Ok(count)
    }

    /// Checks that each bucket is referenced by exactly
    /// `2^(global_depth - local_depth)` slots sharing its low bits, and that
    /// every entry hashes to a slot of its own bucket.
    pub fn verify(&self) -> Result<()> {
        let dir = Directory::load(&self.dir_path)?;
        let mut f = file::open_rw(&self.bucket_path)?;
        let fail = |reason: String| Err(ShelfError::corrupted(&self.dir_path, reason));

        let mut slots_of: HashMap<Address, Vec<usize>> = HashMap::new();
        for (slot, &address) in dir.slots.iter().enumerate() {
            slots_of.entry(address).or_default().push(slot);
        }

        for (&address, slots) in &slots_of {
            let bucket = self.read(&mut f, address)?;
            if bucket.local_depth > dir.global_depth {
                return fail(format!(
                    "bucket {address} local depth {} > global depth {}",
                    bucket.local_depth, dir.global_depth
                ));
            }
            let expected = 1usize << (dir.global_depth - bucket.local_depth);
            if slots.len() != expected {
                return fail(format!(
                    "bucket {address} referenced by {} slots, expected {expected}",
                    slots.len()
                ));
            }
            let mask = Directory::mask(bucket.local_depth) as usize;
            if slots.iter().any(|&s| s & mask != slots[0] & mask) {
                return fail(format!("bucket {address} slots disagree on low bits"));
            }
            for entry in &bucket.entries {
                if dir.slots[dir.slot_of(hash_key(&entry.key))] != address {
                    return fail(format!("bucket {address} holds misplaced key {:?}", entry.key));
                }
            }
        }
        Ok(())
    }
}
