//! Positioned file I/O shared by the heap, the indexes and the sorter.
//!
//! Components never keep a handle between operations: each call opens the
//! file, seeks, reads or writes, and drops the handle before returning.

use shelf_common::Result;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Opens (creating if needed) a file for random-access reads and writes.
pub(crate) fn open_rw(path: &Path) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    Ok(file)
}

/// Returns the current length of `file` in bytes.
pub(crate) fn file_len(file: &File) -> Result<u64> {
    Ok(file.metadata()?.len())
}

/// Reads exactly `buf.len()` bytes at `offset`.
pub(crate) fn read_at(file: &mut File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)?;
    Ok(())
}

/// Writes all of `data` at `offset`.
pub(crate) fn write_at(file: &mut File, offset: u64, data: &[u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(data)?;
    Ok(())
}

/// Appends `data` at end-of-file and returns the offset it was written at.
pub(crate) fn append(file: &mut File, data: &[u8]) -> Result<u64> {
    let offset = file.seek(SeekFrom::End(0))?;
    file.write_all(data)?;
    Ok(offset)
}

/// Flushes file contents to disk when `enabled`.
pub(crate) fn sync(file: &File, enabled: bool) -> Result<()> {
    if enabled {
        file.sync_all()?;
    }
    Ok(())
}

/// Truncates the file at `path` to zero bytes, creating it if missing.
pub(crate) fn truncate(path: &Path) -> Result<()> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    Ok(())
}
