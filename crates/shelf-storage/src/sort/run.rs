//! Run files: headerless sequences of heap-framed slots.

use crate::file;
use crate::heap::{encode_slot, read_slot};
use shelf_common::{Record, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Buffered writer that truncates its file on creation.
pub(crate) struct RunWriter {
    writer: BufWriter<File>,
    records: usize,
}

impl RunWriter {
    pub fn create(path: &Path) -> Result<Self> {
        file::truncate(path)?;
        Ok(Self {
            writer: BufWriter::new(file::open_rw(path)?),
            records: 0,
        })
    }

    pub fn push<T: Record>(&mut self, record: &T) -> Result<()> {
        self.writer.write_all(&encode_slot(&record.encode()?))?;
        self.records += 1;
        Ok(())
    }

    /// Flushes and closes the file, returning the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.writer.flush()?;
        Ok(self.records)
    }
}

/// Sequential reader with a one-record lookahead.
pub(crate) struct RunReader<T> {
    reader: BufReader<File>,
    path: PathBuf,
    head: Option<T>,
}

impl<T: Record> RunReader<T> {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = Self {
            reader: BufReader::new(file::open_rw(path)?),
            path: path.to_path_buf(),
            head: None,
        };
        reader.head = reader.read_next()?;
        Ok(reader)
    }

    fn read_next(&mut self) -> Result<Option<T>> {
        match read_slot(&mut self.reader, &self.path)? {
            Some((_, payload)) => T::decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// The next record, without consuming it.
    #[inline]
    pub fn peek(&self) -> Option<&T> {
        self.head.as_ref()
    }

    /// Consumes the next record and reads the one after it.
    pub fn advance(&mut self) -> Result<Option<T>> {
        let Some(current) = self.head.take() else {
            return Ok(None);
        };
        self.head = self.read_next()?;
        Ok(Some(current))
    }
}

impl<T: Record> Iterator for RunReader<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Show;
    use tempfile::tempdir;

    #[test]
    fn test_run_write_then_read_with_lookahead() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.sort0.db");

        let mut writer = RunWriter::create(&path).unwrap();
        for (title, year) in [("Lost", 2004), ("Dark", 2017)] {
            writer.push(&Show::new(title, year)).unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 2);

        let mut reader = RunReader::<Show>::open(&path).unwrap();
        assert_eq!(reader.peek().unwrap().title, "Lost");
        assert_eq!(reader.advance().unwrap().unwrap().title, "Lost");
        assert_eq!(reader.peek().unwrap().title, "Dark");
        let rest: Vec<_> = reader.map(|r| r.unwrap().release_year).collect();
        assert_eq!(rest, vec![2017]);
    }

    #[test]
    fn test_run_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.sort1.db");
        let mut writer = RunWriter::create(&path).unwrap();
        writer.push(&Show::new("Lost", 2004)).unwrap();
        writer.finish().unwrap();

        RunWriter::create(&path).unwrap().finish().unwrap();
        let mut reader = RunReader::<Show>::open(&path).unwrap();
        assert!(reader.peek().is_none());
        assert!(reader.advance().unwrap().is_none());
    }
}
