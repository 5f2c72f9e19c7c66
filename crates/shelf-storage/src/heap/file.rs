//! RecordHeap: append-only, tombstoned record storage.

use super::constants::{HEADER_SIZE, SLOT_DEAD, SLOT_HEADER_SIZE};
use super::slot::{encode_slot, read_slot, Slot, SlotHeader};
use crate::file;
use shelf_common::{
    require_extension, Address, FieldValue, Record, Result, ShelfError, StoreConfig,
    UNASSIGNED_ID,
};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Result of [`RecordHeap::update`].
///
/// Indexes that store the record's address must follow a relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The new payload fit in the old slot and was written in place.
    InPlace { address: Address },
    /// The old slot was tombstoned and the record appended at `to`.
    Relocated { from: Address, to: Address },
    /// No live record has the requested identifier.
    NotFound,
}

impl UpdateOutcome {
    pub fn is_found(&self) -> bool {
        !matches!(self, UpdateOutcome::NotFound)
    }

    /// Address the record lives at after the update.
    pub fn address(&self) -> Option<Address> {
        match *self {
            UpdateOutcome::InPlace { address } => Some(address),
            UpdateOutcome::Relocated { to, .. } => Some(to),
            UpdateOutcome::NotFound => None,
        }
    }
}

impl fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOutcome::InPlace { address } => write!(f, "updated in place at {address}"),
            UpdateOutcome::Relocated { from, to } => write!(f, "relocated from {from} to {to}"),
            UpdateOutcome::NotFound => f.write_str("record not found"),
        }
    }
}

/// Append-only binary file of records of type `T`.
///
/// The file is opened on first use and every call closes its handle before
/// returning. The sequential read cursor is independent of the write
/// position.
pub struct RecordHeap<T> {
    /// Path of the heap file.
    path: PathBuf,
    /// Offset of the next slot `read_sequential` will look at.
    cursor: u64,
    /// Call fsync after writes.
    fsync: bool,
    _record: PhantomData<T>,
}

impl<T: Record> RecordHeap<T> {
    /// Creates a heap handle for `path`. The file itself is created lazily.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        require_extension(&path)?;
        Ok(Self {
            path,
            cursor: HEADER_SIZE,
            fsync: false,
            _record: PhantomData,
        })
    }

    /// Creates the heap called `name` under the configured data directory.
    pub fn with_config(config: &StoreConfig, name: &str) -> Result<Self> {
        config.validate()?;
        let mut heap = Self::open(config.heap_path(name))?;
        heap.fsync = config.fsync_enabled;
        Ok(heap)
    }

    /// Returns the heap file path.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens the file for writing, initializing the header if the file is new.
    fn open_for_write(&self) -> Result<File> {
        let mut f = file::open_rw(&self.path)?;
        if file::file_len(&f)? < HEADER_SIZE {
            file::write_at(&mut f, 0, &0i32.to_be_bytes())?;
            debug!(path = %self.path.display(), "initialized heap header");
        }
        Ok(f)
    }

    /// Opens the file for reading; fails with `EmptyStore` if no slot was ever written.
    fn open_for_read(&self) -> Result<File> {
        let empty = || ShelfError::EmptyStore {
            path: self.path.clone(),
        };
        if !self.path.exists() {
            return Err(empty());
        }
        let f = file::open_rw(&self.path)?;
        if file::file_len(&f)? <= HEADER_SIZE {
            return Err(empty());
        }
        Ok(f)
    }

    fn read_header(f: &mut File) -> Result<i32> {
        let mut buf = [0u8; 4];
        file::read_at(f, 0, &mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Returns the last assigned identifier (0 when no record was ever stored).
    pub fn last_id(&self) -> Result<i32> {
        if !self.path.exists() {
            return Ok(0);
        }
        let mut f = file::open_rw(&self.path)?;
        if file::file_len(&f)? < HEADER_SIZE {
            return Ok(0);
        }
        Self::read_header(&mut f)
    }

    /// Appends `record` and returns the address of its slot.
    ///
    /// An unassigned identifier is replaced with `last_id + 1` and written
    /// back into `record`. An explicit identifier must be greater than
    /// `last_id`.
    pub fn create(&mut self, record: &mut T) -> Result<Address> {
        let mut f = self.open_for_write()?;
        let last_id = Self::read_header(&mut f)?;

        let id = if record.id() == UNASSIGNED_ID {
            next_id(last_id)?
        } else if record.id() > last_id {
            record.id()
        } else {
            return Err(ShelfError::DuplicateIdentifier {
                id: record.id(),
                last_id,
            });
        };
        let previous = record.id();
        record.set_id(id);
        let payload = match record.encode() {
            Ok(payload) => payload,
            Err(e) => {
                record.set_id(previous);
                return Err(e);
            }
        };

        let address = file::append(&mut f, &encode_slot(&payload))?;
        file::write_at(&mut f, 0, &id.to_be_bytes())?;
        file::sync(&f, self.fsync)?;
        Ok(address)
    }

    /// Returns the next live record after the cursor, or `None` at end of file.
    pub fn read_sequential(&mut self) -> Result<Option<T>> {
        let mut f = self.open_for_read()?;
        f.seek(SeekFrom::Start(self.cursor))?;
        let mut reader = BufReader::new(f);

        while let Some((header, payload)) = read_slot(&mut reader, &self.path)? {
            self.cursor += (SLOT_HEADER_SIZE + payload.len()) as u64;
            if header.live {
                return T::decode(&payload).map(Some);
            }
        }
        Ok(None)
    }

    /// Moves the sequential cursor back to the first slot.
    pub fn rewind(&mut self) {
        self.cursor = HEADER_SIZE;
    }

    /// Reads the record at `address`; `None` if that slot is tombstoned.
    pub fn read_at(&self, address: Address) -> Result<Option<T>> {
        let mut f = self.open_for_read()?;
        let (header, payload) = self.read_slot_at(&mut f, address)?;
        if !header.live {
            return Ok(None);
        }
        T::decode(&payload).map(Some)
    }

    fn read_slot_at(&self, f: &mut File, address: Address) -> Result<(SlotHeader, Vec<u8>)> {
        let len = file::file_len(f)?;
        if address < HEADER_SIZE || address + SLOT_HEADER_SIZE as u64 > len {
            return Err(ShelfError::corrupted(
                &self.path,
                format!("slot address {address} outside file of {len} bytes"),
            ));
        }
        f.seek(SeekFrom::Start(address))?;
        read_slot(&mut BufReader::new(f), &self.path)?
            .ok_or_else(|| ShelfError::corrupted(&self.path, "slot vanished"))
    }

    /// Iterates over live records with their addresses.
    pub fn scan(&self) -> Result<HeapScan<T>> {
        self.scan_inner(false)
    }

    /// Iterates over every slot, tombstoned ones included.
    pub fn scan_slots(&self) -> Result<HeapScan<T>> {
        self.scan_inner(true)
    }

    fn scan_inner(&self, include_dead: bool) -> Result<HeapScan<T>> {
        let mut f = self.open_for_read()?;
        f.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(HeapScan {
            reader: BufReader::new(f),
            path: self.path.clone(),
            offset: HEADER_SIZE,
            include_dead,
            _record: PhantomData,
        })
    }

    /// Address of the first live record whose `field` equals `value`.
    pub fn find(&self, field: &str, value: &FieldValue) -> Result<Option<Address>> {
        for slot in self.scan()? {
            let slot = slot?;
            if slot.record.matches(field, value) {
                return Ok(Some(slot.address));
            }
        }
        Ok(None)
    }

    /// Every live record whose `field` equals `value`.
    pub fn find_all(&self, field: &str, value: &FieldValue) -> Result<Vec<T>> {
        let mut found = Vec::new();
        for slot in self.scan()? {
            let slot = slot?;
            if slot.record.matches(field, value) {
                found.push(slot.record);
            }
        }
        Ok(found)
    }

    /// Address of the live record with identifier `id`.
    pub fn find_id(&self, id: i32) -> Result<Option<Address>> {
        Ok(self.locate(id)?.map(|slot| slot.address))
    }

    fn locate(&self, id: i32) -> Result<Option<Slot<T>>> {
        let scan = match self.scan() {
            Ok(scan) => scan,
            Err(ShelfError::EmptyStore { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        for slot in scan {
            let slot = slot?;
            if slot.record.id() == id {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    /// Replaces the record with identifier `id` by `record`.
    pub fn update(&mut self, id: i32, record: &T) -> Result<UpdateOutcome> {
        let Some(slot) = self.locate(id)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        let mut replacement = record.clone();
        replacement.set_id(id);
        self.rewrite(&slot, &replacement)
    }

    /// Applies `mutate` to the record with identifier `id` and stores the result.
    pub fn update_with(&mut self, id: i32, mutate: impl FnOnce(&mut T)) -> Result<UpdateOutcome> {
        let Some(mut slot) = self.locate(id)? else {
            return Ok(UpdateOutcome::NotFound);
        };
        mutate(&mut slot.record);
        slot.record.set_id(id);
        let replacement = slot.record.clone();
        self.rewrite(&slot, &replacement)
    }

    fn rewrite(&mut self, slot: &Slot<T>, replacement: &T) -> Result<UpdateOutcome> {
        let payload = replacement.encode()?;
        let mut f = self.open_for_write()?;

        let outcome = if payload.len() <= slot.capacity as usize {
            let mut padded = payload;
            padded.resize(slot.capacity as usize, 0);
            file::write_at(&mut f, slot.address + SLOT_HEADER_SIZE as u64, &padded)?;
            UpdateOutcome::InPlace {
                address: slot.address,
            }
        } else {
            file::write_at(&mut f, slot.address, &[SLOT_DEAD])?;
            let to = file::append(&mut f, &encode_slot(&payload))?;
            UpdateOutcome::Relocated {
                from: slot.address,
                to,
            }
        };
        file::sync(&f, self.fsync)?;
        debug!(id = replacement.id(), %outcome, "heap update");
        Ok(outcome)
    }

    /// Tombstones the record with identifier `id`. Returns false if it was not live.
    pub fn delete(&mut self, id: i32) -> Result<bool> {
        let Some(slot) = self.locate(id)? else {
            return Ok(false);
        };
        let mut f = self.open_for_write()?;
        file::write_at(&mut f, slot.address, &[SLOT_DEAD])?;
        file::sync(&f, self.fsync)?;
        Ok(true)
    }

    /// Number of live records.
    pub fn count(&self) -> Result<usize> {
        let scan = match self.scan() {
            Ok(scan) => scan,
            Err(ShelfError::EmptyStore { .. }) => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for slot in scan {
            slot?;
            count += 1;
        }
        Ok(count)
    }

    /// Truncates the heap, discarding every record and the identifier counter.
    pub fn clear(&mut self) -> Result<()> {
        file::truncate(&self.path)?;
        self.rewind();
        Ok(())
    }

    /// Replaces this heap's contents with the live records of `other`.
    ///
    /// Records are appended in `other`'s scan order with fresh identifiers.
    pub fn copy_from(&mut self, other: &RecordHeap<T>) -> Result<usize> {
        if other.path == self.path {
            return Err(ShelfError::InvalidConfiguration(format!(
                "cannot copy heap {} onto itself",
                self.path.display()
            )));
        }
        match other.scan() {
            Ok(scan) => self.load(scan.map(|slot| slot.map(|s| s.record))),
            Err(ShelfError::EmptyStore { .. }) => self.load(std::iter::empty()),
            Err(e) => Err(e),
        }
    }

    /// Truncates the heap and appends `records` with fresh identifiers `1..=n`.
    ///
    /// Uses a single buffered handle, so it is the bulk path for copies.
    pub fn load<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        self.refill(records, true)
    }

    /// Truncates the heap and appends `records` keeping their identifiers.
    ///
    /// The header keeps the previous last identifier unless a restored record
    /// carries a larger one, so identifiers are never handed out twice.
    pub fn restore<I>(&mut self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        self.refill(records, false)
    }

    fn refill<I>(&mut self, records: I, renumber: bool) -> Result<usize>
    where
        I: IntoIterator<Item = Result<T>>,
    {
        let mut last_id = if renumber { 0 } else { self.last_id()? };
        self.clear()?;
        let mut f = self.open_for_write()?;
        f.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut writer = BufWriter::new(f);

        let mut written = 0usize;
        for record in records {
            let mut record = record?;
            if renumber {
                last_id = next_id(last_id)?;
                record.set_id(last_id);
            } else {
                last_id = last_id.max(record.id());
            }
            writer.write_all(&encode_slot(&record.encode()?))?;
            written += 1;
        }

        let mut f = writer.into_inner().map_err(|e| e.into_error())?;
        file::write_at(&mut f, 0, &last_id.to_be_bytes())?;
        file::sync(&f, self.fsync)?;
        debug!(path = %self.path.display(), records = written, renumber, "heap refilled");
        Ok(written)
    }
}

/// Identifier after `last_id`; the id space ends at `i32::MAX`.
fn next_id(last_id: i32) -> Result<i32> {
    last_id
        .checked_add(1)
        .ok_or(ShelfError::DuplicateIdentifier { id: last_id, last_id })
}

/// Iterator over the slots of a heap, produced by [`RecordHeap::scan`].
///
/// Holds its own read handle until dropped.
pub struct HeapScan<T> {
    reader: BufReader<File>,
    path: PathBuf,
    offset: u64,
    include_dead: bool,
    _record: PhantomData<T>,
}

impl<T: Record> Iterator for HeapScan<T> {
    type Item = Result<Slot<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (header, payload) = match read_slot(&mut self.reader, &self.path) {
                Ok(Some(slot)) => slot,
                Ok(None) => return None,
                Err(e) => return Some(Err(e)),
            };
            let address = self.offset;
            self.offset += (SLOT_HEADER_SIZE + payload.len()) as u64;
            if !header.live && !self.include_dead {
                continue;
            }
            return Some(T::decode(&payload).map(|record| Slot {
                address,
                live: header.live,
                capacity: header.len,
                record,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Show;
    use tempfile::tempdir;

    fn create_test_heap() -> (RecordHeap<Show>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let heap = RecordHeap::open(dir.path().join("shows.db")).unwrap();
        (heap, dir)
    }

    #[test]
    fn test_heap_requires_extension() {
        let dir = tempdir().unwrap();
        let result = RecordHeap::<Show>::open(dir.path().join("shows"));
        assert!(matches!(result, Err(ShelfError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_heap_create_assigns_ids() {
        let (mut heap, _dir) = create_test_heap();
        assert_eq!(heap.last_id().unwrap(), 0);

        let mut first = Show::new("Lost", 2004);
        let addr1 = heap.create(&mut first).unwrap();
        let mut second = Show::new("Dark", 2017);
        let addr2 = heap.create(&mut second).unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(addr1, HEADER_SIZE);
        assert!(addr2 > addr1);
        assert_eq!(heap.last_id().unwrap(), 2);
    }

    #[test]
    fn test_heap_explicit_id_must_increase() {
        let (mut heap, _dir) = create_test_heap();
        let mut show = Show::new("Fargo", 2014);
        show.id = 10;
        heap.create(&mut show).unwrap();

        let mut stale = Show::new("Louie", 2010);
        stale.id = 10;
        assert!(matches!(
            heap.create(&mut stale),
            Err(ShelfError::DuplicateIdentifier { id: 10, last_id: 10 })
        ));
        assert_eq!(heap.count().unwrap(), 1);

        let mut next = Show::new("Louie", 2010);
        heap.create(&mut next).unwrap();
        assert_eq!(next.id, 11);
    }

    #[test]
    fn test_heap_id_space_exhausted() {
        let (mut heap, _dir) = create_test_heap();
        let mut last = Show::new("Fargo", 2014);
        last.id = i32::MAX;
        heap.create(&mut last).unwrap();

        let mut next = Show::new("Louie", 2010);
        assert!(matches!(
            heap.create(&mut next),
            Err(ShelfError::DuplicateIdentifier { id: i32::MAX, .. })
        ));
        assert_eq!(next.id, UNASSIGNED_ID);
        assert_eq!(heap.count().unwrap(), 1);
    }

    #[test]
    fn test_heap_rejects_unencodable_record() {
        let (mut heap, _dir) = create_test_heap();
        let mut huge = Show::new(&"x".repeat(70_000), 2004);
        assert!(matches!(heap.create(&mut huge), Err(ShelfError::Codec(_))));
        assert_eq!(huge.id, UNASSIGNED_ID);
        assert_eq!(heap.last_id().unwrap(), 0);

        let mut show = Show::new("Lost", 2004);
        let address = heap.create(&mut show).unwrap();
        assert_eq!(show.id, 1);
        assert_eq!(heap.read_at(address).unwrap().unwrap().title, "Lost");
    }

    #[test]
    fn test_heap_empty_store() {
        let (mut heap, _dir) = create_test_heap();
        assert!(matches!(
            heap.read_sequential(),
            Err(ShelfError::EmptyStore { .. })
        ));
        assert!(heap.read_at(HEADER_SIZE).unwrap_err().is_empty_store());
        assert_eq!(heap.count().unwrap(), 0);
        assert!(!heap.delete(1).unwrap());
    }

    #[test]
    fn test_heap_read_sequential_skips_tombstones() {
        let (mut heap, _dir) = create_test_heap();
        for (title, year) in [("Lost", 2004), ("Dark", 2017), ("Ozark", 2017)] {
            heap.create(&mut Show::new(title, year)).unwrap();
        }
        assert!(heap.delete(2).unwrap());

        let mut titles = Vec::new();
        while let Some(show) = heap.read_sequential().unwrap() {
            titles.push(show.title);
        }
        assert_eq!(titles, vec!["Lost", "Ozark"]);
        assert!(heap.read_sequential().unwrap().is_none());

        heap.rewind();
        assert_eq!(heap.read_sequential().unwrap().unwrap().title, "Lost");
    }

    #[test]
    fn test_heap_read_at_tombstoned() {
        let (mut heap, _dir) = create_test_heap();
        let addr = heap.create(&mut Show::new("Lost", 2004)).unwrap();
        assert_eq!(heap.read_at(addr).unwrap().unwrap().title, "Lost");
        heap.delete(1).unwrap();
        assert!(heap.read_at(addr).unwrap().is_none());
        assert!(matches!(
            heap.read_at(addr + 1_000),
            Err(ShelfError::Corrupted { .. })
        ));
    }

    #[test]
    fn test_heap_find_and_find_all() {
        let (mut heap, _dir) = create_test_heap();
        heap.create(&mut Show::new("Lost", 2004)).unwrap();
        let dark = heap.create(&mut Show::new("Dark", 2017)).unwrap();
        heap.create(&mut Show::new("Ozark", 2017)).unwrap();

        assert_eq!(heap.find("releaseYear", &2017.into()).unwrap(), Some(dark));
        assert_eq!(heap.find("title", &"Fargo".into()).unwrap(), None);

        let found = heap.find_all("releaseYear", &2017.into()).unwrap();
        let titles: Vec<_> = found.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Dark", "Ozark"]);
    }

    #[test]
    fn test_heap_update_in_place() {
        let (mut heap, _dir) = create_test_heap();
        let addr = heap.create(&mut Show::new("The Wire", 2002)).unwrap();

        let outcome = heap.update(1, &Show::new("Wire", 2003)).unwrap();
        assert_eq!(outcome, UpdateOutcome::InPlace { address: addr });

        let show = heap.read_at(addr).unwrap().unwrap();
        assert_eq!(show.id, 1);
        assert_eq!(show.title, "Wire");
        assert_eq!(show.release_year, 2003);
    }

    #[test]
    fn test_heap_update_relocates_larger_record() {
        let (mut heap, _dir) = create_test_heap();
        let addr = heap.create(&mut Show::new("Lost", 2004)).unwrap();
        heap.create(&mut Show::new("Dark", 2017)).unwrap();

        let outcome = heap
            .update_with(1, |show| show.title = "Lost: The Complete Series".to_string())
            .unwrap();
        let UpdateOutcome::Relocated { from, to } = outcome else {
            panic!("expected relocation, got {outcome:?}");
        };
        assert_eq!(from, addr);
        assert!(to > from);
        assert!(heap.read_at(from).unwrap().is_none());
        assert_eq!(heap.read_at(to).unwrap().unwrap().title, "Lost: The Complete Series");
        assert_eq!(heap.find_id(1).unwrap(), Some(to));
        assert_eq!(heap.count().unwrap(), 2);
    }

    #[test]
    fn test_heap_update_missing() {
        let (mut heap, _dir) = create_test_heap();
        heap.create(&mut Show::new("Lost", 2004)).unwrap();
        let outcome = heap.update(99, &Show::new("Nope", 1)).unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
        assert!(!outcome.is_found());
        assert_eq!(outcome.to_string(), "record not found");
    }

    #[test]
    fn test_heap_tombstone_still_visible_in_raw_scan() {
        let (mut heap, _dir) = create_test_heap();
        heap.create(&mut Show::new("Lost", 2004)).unwrap();
        heap.create(&mut Show::new("Dark", 2017)).unwrap();
        heap.delete(1).unwrap();

        assert_eq!(heap.find_id(1).unwrap(), None);
        let slots: Vec<_> = heap.scan_slots().unwrap().map(|s| s.unwrap()).collect();
        assert_eq!(slots.len(), 2);
        assert!(!slots[0].live);
        assert_eq!(slots[0].record.id, 1);
        assert!(slots[1].live);
    }

    #[test]
    fn test_heap_copy_from_assigns_fresh_ids() {
        let dir = tempdir().unwrap();
        let mut source = RecordHeap::<Show>::open(dir.path().join("a.db")).unwrap();
        let mut target = RecordHeap::<Show>::open(dir.path().join("b.db")).unwrap();

        for (title, year) in [("Lost", 2004), ("Dark", 2017), ("Ozark", 2017)] {
            source.create(&mut Show::new(title, year)).unwrap();
        }
        source.delete(1).unwrap();
        target.create(&mut Show::new("Stale", 1990)).unwrap();

        assert_eq!(target.copy_from(&source).unwrap(), 2);
        let ids: Vec<_> = target.scan().unwrap().map(|s| s.unwrap().record.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(target.last_id().unwrap(), 2);
        assert!(target.copy_from(&target_clone(&target)).is_err());
    }

    fn target_clone(heap: &RecordHeap<Show>) -> RecordHeap<Show> {
        RecordHeap::open(heap.path().to_path_buf()).unwrap()
    }

    #[test]
    fn test_heap_clear() {
        let (mut heap, _dir) = create_test_heap();
        heap.create(&mut Show::new("Lost", 2004)).unwrap();
        heap.clear().unwrap();
        assert_eq!(heap.count().unwrap(), 0);
        assert_eq!(heap.last_id().unwrap(), 0);
        heap.create(&mut Show::new("Dark", 2017)).unwrap();
        assert_eq!(heap.last_id().unwrap(), 1);
    }

    #[test]
    fn test_heap_restore_keeps_ids() {
        let (mut heap, _dir) = create_test_heap();
        for (title, year) in [("Lost", 2004), ("Dark", 2017), ("Fargo", 2014)] {
            heap.create(&mut Show::new(title, year)).unwrap();
        }
        heap.delete(3).unwrap();

        let mut records: Vec<Show> = heap.scan().unwrap().map(|s| s.unwrap().record).collect();
        records.reverse();
        assert_eq!(heap.restore(records.into_iter().map(Ok)).unwrap(), 2);

        let ids: Vec<_> = heap.scan().unwrap().map(|s| s.unwrap().record.id).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(heap.last_id().unwrap(), 3);
        let mut next = Show::new("Ozark", 2017);
        heap.create(&mut next).unwrap();
        assert_eq!(next.id, 4);
    }
}
