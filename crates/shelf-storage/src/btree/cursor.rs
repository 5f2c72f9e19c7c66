//! Ordered scans along the leaf chain.

use super::page::{read_page, BTreePage};
use shelf_common::{Address, IndexKey, Result, NO_ADDRESS};
use std::fs::File;
use std::ops::Bound;
use std::path::PathBuf;

/// Iterator over `(key, address)` pairs in ascending key order.
///
/// Starts at a leaf position and follows `next` pointers. Holds its own
/// read handle until dropped.
pub struct LeafCursor<K> {
    file: File,
    path: PathBuf,
    order: usize,
    page: Option<BTreePage<K>>,
    pos: usize,
    upper: Bound<K>,
}

impl<K: IndexKey> LeafCursor<K> {
    pub(crate) fn new(
        file: File,
        path: PathBuf,
        order: usize,
        leaf: BTreePage<K>,
        pos: usize,
        upper: Bound<K>,
    ) -> Self {
        Self {
            file,
            path,
            order,
            page: Some(leaf),
            pos,
            upper,
        }
    }

    fn within_upper(&self, key: &K) -> bool {
        match &self.upper {
            Bound::Included(hi) => key <= hi,
            Bound::Excluded(hi) => key < hi,
            Bound::Unbounded => true,
        }
    }
}

impl<K: IndexKey> Iterator for LeafCursor<K> {
    type Item = Result<(K, Address)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let page = self.page.as_ref()?;
            if let Some(entry) = page.entries.get(self.pos) {
                if !self.within_upper(&entry.key) {
                    self.page = None;
                    return None;
                }
                self.pos += 1;
                return Some(Ok((entry.key.clone(), entry.address)));
            }

            let next = page.next;
            if next == NO_ADDRESS {
                self.page = None;
                return None;
            }
            match read_page(&mut self.file, next, self.order, &self.path) {
                Ok(leaf) => {
                    self.page = Some(leaf);
                    self.pos = 0;
                }
                Err(e) => {
                    self.page = None;
                    return Some(Err(e));
                }
            }
        }
    }
}
