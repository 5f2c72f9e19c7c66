//! Bounded min-heap for replacement selection.
//!
//! Records are ordered by run number first, then by the caller's comparator,
//! so every record of run `r` leaves the heap before any record of `r + 1`.

use std::cmp::Ordering;

pub(crate) struct SelectionHeap<T> {
    items: Vec<(usize, T)>,
}

impl<T> SelectionHeap<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn push<F>(&mut self, run: usize, record: T, compare: &F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        self.items.push((run, record));
        self.sift_up(self.items.len() - 1, compare);
    }

    /// Removes the smallest `(run, record)`.
    pub fn pop<F>(&mut self, compare: &F) -> Option<(usize, T)>
    where
        F: Fn(&T, &T) -> Ordering,
    {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let min = self.items.pop();
        self.sift_down(0, compare);
        min
    }

    fn less<F>(a: &(usize, T), b: &(usize, T), compare: &F) -> bool
    where
        F: Fn(&T, &T) -> Ordering,
    {
        a.0.cmp(&b.0).then_with(|| compare(&a.1, &b.1)) == Ordering::Less
    }

    fn sift_up<F>(&mut self, mut i: usize, compare: &F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !Self::less(&self.items[i], &self.items[parent], compare) {
                break;
            }
            self.items.swap(i, parent);
            i = parent;
        }
    }

    fn sift_down<F>(&mut self, mut i: usize, compare: &F)
    where
        F: Fn(&T, &T) -> Ordering,
    {
        let len = self.items.len();
        loop {
            let left = 2 * i + 1;
            let right = left + 1;
            let mut smallest = i;
            if left < len && Self::less(&self.items[left], &self.items[smallest], compare) {
                smallest = left;
            }
            if right < len && Self::less(&self.items[right], &self.items[smallest], compare) {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.items.swap(i, smallest);
            i = smallest;
        }
    }
}
