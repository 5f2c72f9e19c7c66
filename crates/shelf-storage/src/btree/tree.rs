//! BPlusTree: ordered index from keys to heap addresses.

use super::constants::{FILE_HEADER_SIZE, MIN_ORDER};
use super::cursor::LeafCursor;
use super::page::{read_page, BTreePage, Entry};
use crate::file;
use crate::heap::RecordHeap;
use shelf_common::{
    require_extension, Address, IndexKey, Record, Result, ShelfError, StoreConfig, NO_ADDRESS,
};
use std::fs::File;
use std::marker::PhantomData;
use std::ops::{Bound, RangeBounds};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Page-oriented B+Tree stored in a random-access file.
///
/// Every mutation reads pages as owned values, changes them and writes them
/// back by address. Keys are unique.
pub struct BPlusTree<K> {
    path: PathBuf,
    order: usize,
    fsync: bool,
    _key: PhantomData<K>,
}

impl<K: IndexKey> BPlusTree<K> {
    /// Opens the tree at `path`, creating an empty one if the file is new.
    ///
    /// Fails with `InvalidConfiguration` if `order < 3` and with `Corrupted`
    /// if an existing root page was written with a different order.
    pub fn open(path: impl Into<PathBuf>, order: usize) -> Result<Self> {
        let path = path.into();
        require_extension(&path)?;
        if order < MIN_ORDER {
            return Err(ShelfError::InvalidConfiguration(format!(
                "btree order {order} < {MIN_ORDER}"
            )));
        }
        let tree = Self {
            path,
            order,
            fsync: false,
            _key: PhantomData,
        };

        let mut f = file::open_rw(&tree.path)?;
        if file::file_len(&f)? < FILE_HEADER_SIZE {
            tree.initialize(&mut f)?;
        } else {
            let root = tree.read_root(&mut f)?;
            let mut stored = [0u8; 4];
            file::read_at(&mut f, root, &mut stored)?;
            let stored = i32::from_be_bytes(stored);
            if stored != order as i32 {
                return Err(ShelfError::corrupted(
                    &tree.path,
                    format!("tree has order {stored}, opened with {order}"),
                ));
            }
        }
        Ok(tree)
    }

    /// Opens the tree called `name` under the configured data directory.
    pub fn with_config(config: &StoreConfig, name: &str) -> Result<Self> {
        config.validate()?;
        let mut tree = Self::open(config.btree_path(name), config.btree_order)?;
        tree.fsync = config.fsync_enabled;
        Ok(tree)
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn order(&self) -> usize {
        self.order
    }

    /// On-disk size of every page in this tree.
    #[inline]
    pub fn page_size(&self) -> usize {
        BTreePage::<K>::byte_size(self.order)
    }

    fn initialize(&self, f: &mut File) -> Result<()> {
        file::write_at(f, 0, &NO_ADDRESS.to_be_bytes())?;
        let mut root = BTreePage::new_leaf(self.order);
        let address = self.append(f, &mut root)?;
        self.write_root(f, address)
    }

    // =========================================================================
    // Page I/O
    // =========================================================================

    fn read_root(&self, f: &mut File) -> Result<Address> {
        let mut buf = [0u8; 8];
        file::read_at(f, 0, &mut buf)?;
        let root = u64::from_be_bytes(buf);
        if root == NO_ADDRESS {
            return Err(ShelfError::corrupted(&self.path, "missing root page"));
        }
        Ok(root)
    }

    fn write_root(&self, f: &mut File, root: Address) -> Result<()> {
        file::write_at(f, 0, &root.to_be_bytes())
    }

    fn read(&self, f: &mut File, address: Address) -> Result<BTreePage<K>> {
        read_page(f, address, self.order, &self.path)
    }

    fn write(&self, f: &mut File, page: &BTreePage<K>) -> Result<()> {
        file::write_at(f, page.address, &page.to_bytes())
    }

    fn append(&self, f: &mut File, page: &mut BTreePage<K>) -> Result<Address> {
        page.address = file::append(f, &page.to_bytes())?;
        Ok(page.address)
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Descends from the root to the leaf that would hold `key`.
    fn find_leaf(&self, f: &mut File, key: &K) -> Result<BTreePage<K>> {
        let root = self.read_root(f)?;
        let mut page = self.read(f, root)?;
        while !page.is_leaf() {
            let child = page.children[page.child_index(key)];
            page = self.read(f, child)?;
        }
        Ok(page)
    }

    fn leftmost_leaf(&self, f: &mut File, from: Address) -> Result<BTreePage<K>> {
        let mut page = self.read(f, from)?;
        while !page.is_leaf() {
            page = self.read(f, page.children[0])?;
        }
        Ok(page)
    }

    /// Returns the heap address stored for `key`.
    pub fn search(&self, key: &K) -> Result<Option<Address>> {
        let mut f = file::open_rw(&self.path)?;
        let leaf = self.find_leaf(&mut f, key)?;
        Ok(leaf.search(key).ok().map(|i| leaf.entries[i].address))
    }

    /// Returns true if `key` is present.
    pub fn contains(&self, key: &K) -> Result<bool> {
        Ok(self.search(key)?.is_some())
    }

    /// Rewrites the address stored for `key`, e.g. after a heap relocation.
    pub fn update(&mut self, key: &K, address: Address) -> Result<bool> {
        let mut f = file::open_rw(&self.path)?;
        let mut leaf = self.find_leaf(&mut f, key)?;
        let Ok(pos) = leaf.search(key) else {
            return Ok(false);
        };
        leaf.entries[pos].address = address;
        self.write(&mut f, &leaf)?;
        file::sync(&f, self.fsync)?;
        Ok(true)
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Inserts `key -> address`. Fails with `DuplicateKey` and leaves the
    /// tree unchanged if the key is already present.
    pub fn insert(&mut self, key: K, address: Address) -> Result<()> {
        let mut f = file::open_rw(&self.path)?;
        let root = self.read_root(&mut f)?;

        if let Some((separator, right)) = self.insert_into(&mut f, root, &key, address)? {
            let mut new_root = BTreePage::new_internal(self.order);
            new_root.entries.push(Entry::separator(separator));
            new_root.children.extend([root, right]);
            let new_root_address = self.append(&mut f, &mut new_root)?;
            self.write_root(&mut f, new_root_address)?;
            debug!(root = new_root_address, "btree root split, height grew");
        }
        file::sync(&f, self.fsync)
    }

    /// Inserts into the subtree at `address`.
    ///
    /// Returns the separator and new right sibling if the page split.
    fn insert_into(
        &self,
        f: &mut File,
        address: Address,
        key: &K,
        value: Address,
    ) -> Result<Option<(K, Address)>> {
        let mut page = self.read(f, address)?;

        if page.is_leaf() {
            let pos = match page.search(key) {
                Ok(_) => return Err(ShelfError::DuplicateKey),
                Err(pos) => pos,
            };
            page.entries.insert(
                pos,
                Entry {
                    key: key.clone(),
                    address: value,
                },
            );
        } else {
            let idx = page.child_index(key);
            match self.insert_into(f, page.children[idx], key, value)? {
                None => return Ok(None),
                Some((separator, right)) => {
                    page.entries.insert(idx, Entry::separator(separator));
                    page.children.insert(idx + 1, right);
                }
            }
        }

        if !page.is_overfull() {
            self.write(f, &page)?;
            return Ok(None);
        }

        let (separator, mut right) = page.split();
        let right_address = self.append(f, &mut right)?;
        if page.is_leaf() {
            page.next = right_address;
        }
        self.write(f, &page)?;
        debug!(
            page = page.address,
            right = right_address,
            leaf = page.is_leaf(),
            "btree page split"
        );
        Ok(Some((separator, right_address)))
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Removes `key`. Returns false if it was not present.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        let mut f = file::open_rw(&self.path)?;
        let root_address = self.read_root(&mut f)?;

        if self.delete_from(&mut f, root_address, key)?.is_none() {
            return Ok(false);
        }

        let root = self.read(&mut f, root_address)?;
        if !root.is_leaf() && root.key_count() == 0 {
            self.write_root(&mut f, root.children[0])?;
            debug!(root = root.children[0], "btree root collapsed, height shrank");
        }
        file::sync(&f, self.fsync)?;
        Ok(true)
    }

    /// Deletes from the subtree at `address`.
    ///
    /// Returns `None` if the key is absent, otherwise whether the page at
    /// `address` is now below the minimum fill.
    fn delete_from(&self, f: &mut File, address: Address, key: &K) -> Result<Option<bool>> {
        let mut page = self.read(f, address)?;

        if page.is_leaf() {
            let Ok(pos) = page.search(key) else {
                return Ok(None);
            };
            page.entries.remove(pos);
            self.write(f, &page)?;
            return Ok(Some(page.is_underflow()));
        }

        let idx = page.child_index(key);
        let Some(child_underflow) = self.delete_from(f, page.children[idx], key)? else {
            return Ok(None);
        };
        // Fixed before rebalancing too, since an internal borrow rotates the
        // separator down into the child.
        self.replace_separator(f, &mut page, key)?;
        if child_underflow {
            self.rebalance(f, &mut page, idx)?;
            self.replace_separator(f, &mut page, key)?;
        }

        self.write(f, &page)?;
        Ok(Some(page.is_underflow()))
    }

    /// Replaces a separator equal to the deleted `key` with the minimum of
    /// its right subtree. Leaves it alone if that subtree is momentarily empty.
    fn replace_separator(&self, f: &mut File, page: &mut BTreePage<K>, key: &K) -> Result<()> {
        if let Some(pos) = page.entries.iter().position(|e| e.key == *key) {
            let leaf = self.leftmost_leaf(f, page.children[pos + 1])?;
            if let Some(first) = leaf.entries.first() {
                page.entries[pos].key = first.key.clone();
            }
        }
        Ok(())
    }

    /// Restores the fill of `parent.children[idx]`: borrow from the left
    /// sibling, borrow from the right, merge into the left, merge the right in.
    ///
    /// Writes every changed child; the caller writes `parent`.
    fn rebalance(&self, f: &mut File, parent: &mut BTreePage<K>, idx: usize) -> Result<()> {
        let mut child = self.read(f, parent.children[idx])?;

        let mut left = match idx {
            0 => None,
            _ => Some(self.read(f, parent.children[idx - 1])?),
        };
        if let Some(left) = left.as_mut().filter(|l| l.can_borrow()) {
            Self::borrow_from_left(parent, idx, left, &mut child);
            self.write(f, left)?;
            self.write(f, &child)?;
            debug!(page = child.address, from = left.address, "btree borrow left");
            return Ok(());
        }

        let mut right = if idx + 1 < parent.children.len() {
            Some(self.read(f, parent.children[idx + 1])?)
        } else {
            None
        };
        if let Some(right) = right.as_mut().filter(|r| r.can_borrow()) {
            Self::borrow_from_right(parent, idx, &mut child, right);
            self.write(f, right)?;
            self.write(f, &child)?;
            debug!(page = child.address, from = right.address, "btree borrow right");
            return Ok(());
        }

        if let Some(mut left) = left {
            Self::merge(parent, idx - 1, &mut left, child);
            self.write(f, &left)?;
            debug!(into = left.address, "btree merge with left");
        } else if let Some(right) = right {
            Self::merge(parent, idx, &mut child, right);
            self.write(f, &child)?;
            debug!(into = child.address, "btree merge with right");
        }
        Ok(())
    }

    fn borrow_from_left(
        parent: &mut BTreePage<K>,
        idx: usize,
        left: &mut BTreePage<K>,
        child: &mut BTreePage<K>,
    ) {
        let Some(last) = left.entries.pop() else {
            return;
        };
        if child.is_leaf() {
            child.entries.insert(0, last);
            parent.entries[idx - 1].key = child.entries[0].key.clone();
        } else {
            let down = std::mem::replace(&mut parent.entries[idx - 1].key, last.key);
            child.entries.insert(0, Entry::separator(down));
            if let Some(moved) = left.children.pop() {
                child.children.insert(0, moved);
            }
        }
    }

    fn borrow_from_right(
        parent: &mut BTreePage<K>,
        idx: usize,
        child: &mut BTreePage<K>,
        right: &mut BTreePage<K>,
    ) {
        if right.entries.is_empty() {
            return;
        }
        let first = right.entries.remove(0);
        if child.is_leaf() {
            child.entries.push(first);
            parent.entries[idx].key = right.entries[0].key.clone();
        } else {
            let down = std::mem::replace(&mut parent.entries[idx].key, first.key);
            child.entries.push(Entry::separator(down));
            child.children.push(right.children.remove(0));
        }
    }

    /// Appends `right` onto `left` and drops the separator between them.
    fn merge(
        parent: &mut BTreePage<K>,
        separator: usize,
        left: &mut BTreePage<K>,
        right: BTreePage<K>,
    ) {
        let removed = parent.entries.remove(separator);
        parent.children.remove(separator + 1);
        if left.is_leaf() {
            left.next = right.next;
        } else {
            left.entries.push(Entry::separator(removed.key));
            left.children.extend(right.children);
        }
        left.entries.extend(right.entries);
    }

    // =========================================================================
    // Scans
    // =========================================================================

    /// Iterates over every entry in ascending key order.
    pub fn iter(&self) -> Result<LeafCursor<K>> {
        let mut f = file::open_rw(&self.path)?;
        let root = self.read_root(&mut f)?;
        let leaf = self.leftmost_leaf(&mut f, root)?;
        Ok(LeafCursor::new(f, self.path.clone(), self.order, leaf, 0, Bound::Unbounded))
    }

    /// Iterates over the entries whose keys fall in `range`.
    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Result<LeafCursor<K>> {
        let mut f = file::open_rw(&self.path)?;
        let (leaf, pos) = match range.start_bound() {
            Bound::Unbounded => {
                let root = self.read_root(&mut f)?;
                (self.leftmost_leaf(&mut f, root)?, 0)
            }
            Bound::Included(lo) => {
                let leaf = self.find_leaf(&mut f, lo)?;
                let pos = leaf.entries.partition_point(|e| e.key < *lo);
                (leaf, pos)
            }
            Bound::Excluded(lo) => {
                let leaf = self.find_leaf(&mut f, lo)?;
                let pos = leaf.entries.partition_point(|e| e.key <= *lo);
                (leaf, pos)
            }
        };
        let upper = range.end_bound().cloned();
        Ok(LeafCursor::new(f, self.path.clone(), self.order, leaf, pos, upper))
    }

    /// Number of keys in the tree.
    pub fn len(&self) -> Result<usize> {
        let mut count = 0;
        for entry in self.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.iter()?.next().transpose()?.is_none())
    }

    /// Number of levels, 1 when the root is a leaf.
    pub fn height(&self) -> Result<usize> {
        let mut f = file::open_rw(&self.path)?;
        let root = self.read_root(&mut f)?;
        let mut page = self.read(&mut f, root)?;
        let mut height = 1;
        while !page.is_leaf() {
            page = self.read(&mut f, page.children[0])?;
            height += 1;
        }
        Ok(height)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Truncates the index file and starts over with an empty root leaf.
    pub fn clear(&mut self) -> Result<()> {
        file::truncate(&self.path)?;
        let mut f = file::open_rw(&self.path)?;
        self.initialize(&mut f)?;
        file::sync(&f, self.fsync)
    }

    /// Clears the index and re-inserts `key_of(record)` for every live heap record.
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
        debug!(path = %self.path.display(), count, "btree rebuilt from heap");
        Ok(count)
    }

    /// Checks key order, fill bounds, uniform leaf depth and the leaf chain.
    pub fn verify(&self) -> Result<()> {
        let mut f = file::open_rw(&self.path)?;
        let root = self.read_root(&mut f)?;
        let mut leaf_depth = None;
        let mut leaf_keys = 0;
        self.verify_page(
            &mut f,
            root,
            true,
            (None, None),
            0,
            &mut leaf_depth,
            &mut leaf_keys,
        )?;

        let mut chained = 0;
        let mut previous: Option<K> = None;
        for entry in self.iter()? {
            let (key, _) = entry?;
            if previous.as_ref().is_some_and(|p| *p >= key) {
                return Err(ShelfError::corrupted(&self.path, "leaf chain out of order"));
            }
            previous = Some(key);
            chained += 1;
        }
        if chained != leaf_keys {
            return Err(ShelfError::corrupted(
                &self.path,
                format!("leaf chain holds {chained} keys, leaves hold {leaf_keys}"),
            ));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_page(
        &self,
        f: &mut File,
        address: Address,
        is_root: bool,
        bounds: (Option<&K>, Option<&K>),
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaf_keys: &mut usize,
    ) -> Result<()> {
        let page = self.read(f, address)?;
        let fail = |reason: String| Err(ShelfError::corrupted(&self.path, reason));

        if !is_root && page.is_underflow() {
            return fail(format!("page {address} holds {} keys", page.key_count()));
        }
        if !is_root && !page.is_leaf() && page.key_count() == 0 {
            return fail(format!("internal page {address} has no keys"));
        }
        if page.entries.windows(2).any(|w| w[0].key >= w[1].key) {
            return fail(format!("page {address} keys out of order"));
        }
        for entry in &page.entries {
            let below = bounds.0.is_some_and(|lo| entry.key < *lo);
            let above = bounds.1.is_some_and(|hi| entry.key >= *hi);
            if below || above {
                return fail(format!("page {address} key {:?} outside separators", entry.key));
            }
        }

        if page.is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return fail(format!("leaf {address} at depth {depth}, expected {d}"));
                }
                Some(_) => {}
            }
            *leaf_keys += page.key_count();
            return Ok(());
        }

        if page.children.len() != page.key_count() + 1 {
            return fail(format!("internal page {address} child count mismatch"));
        }
        for (i, &child) in page.children.iter().enumerate() {
            let lo = if i == 0 { bounds.0 } else { Some(&page.entries[i - 1].key) };
            let hi = page.entries.get(i).map(|e| &e.key).or(bounds.1);
            self.verify_page(f, child, false, (lo, hi), depth + 1, leaf_depth, leaf_keys)?;
        }
        Ok(())
    }
}
