//! Record codec contract.
//!
//! Every entity stored in a `RecordHeap` implements [`Record`]. The storage
//! layer never looks inside a payload; it only needs the identifier, the
//! byte codec and the ability to compare a named field against a value.

use crate::error::{Result, ShelfError};
use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Identifier of a record that has not been stored yet.
pub const UNASSIGNED_ID: i32 = -1;

/// A field value used for lookups and field comparators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl PartialOrd for FieldValue {
    /// Values of different kinds are unordered, except that integers and
    /// floats compare numerically.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => Some(a.cmp(b)),
            (FieldValue::Float(a), FieldValue::Float(b)) => a.partial_cmp(b),
            (FieldValue::Int(a), FieldValue::Float(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::Float(a), FieldValue::Int(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Int(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

/// Serialization and field access for a stored entity.
///
/// `decode` must be self-delimiting: an in-place heap update can leave
/// zeroed bytes after the encoded payload, and those must be ignored.
pub trait Record: Clone + Sized {
    /// Identifier, or [`UNASSIGNED_ID`] before the record is stored.
    fn id(&self) -> i32;

    fn set_id(&mut self, id: i32);

    /// Encodes the record, identifier included.
    fn encode(&self) -> Result<Vec<u8>>;

    /// Decodes a record from a payload produced by [`Record::encode`].
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Returns the value of the named field, or `None` if there is no such field.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Compares the named field against `value`.
    fn compare_field(&self, name: &str, value: &FieldValue) -> Option<Ordering> {
        self.field(name)?.partial_cmp(value)
    }

    /// Returns true if the named field equals `value`.
    fn matches(&self, name: &str, value: &FieldValue) -> bool {
        self.compare_field(name, value) == Some(Ordering::Equal)
    }
}

/// Writes a u16 length-prefixed UTF-8 string. Fails with `Codec` if the
/// string is longer than `u16::MAX` bytes.
pub fn put_str(buf: &mut impl BufMut, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        ShelfError::Codec(format!(
            "string of {} bytes exceeds the {} byte limit",
            s.len(),
            u16::MAX
        ))
    })?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

/// Reads a string written by [`put_str`].
pub fn get_str(buf: &mut impl Buf) -> Result<String> {
    let len = get_u16(buf)? as usize;
    if buf.remaining() < len {
        return Err(ShelfError::Codec(format!(
            "string of {len} bytes exceeds remaining {}",
            buf.remaining()
        )));
    }
    let mut bytes = vec![0u8; len];
    buf.copy_to_slice(&mut bytes);
    String::from_utf8(bytes).map_err(|e| ShelfError::Codec(e.to_string()))
}

/// Reads a big-endian u16, failing instead of panicking on short input.
pub fn get_u16(buf: &mut impl Buf) -> Result<u16> {
    ensure_remaining(&*buf, 2)?;
    Ok(buf.get_u16())
}

/// Reads a big-endian i32, failing instead of panicking on short input.
pub fn get_i32(buf: &mut impl Buf) -> Result<i32> {
    ensure_remaining(&*buf, 4)?;
    Ok(buf.get_i32())
}

/// Reads a big-endian f64, failing instead of panicking on short input.
pub fn get_f64(buf: &mut impl Buf) -> Result<f64> {
    ensure_remaining(&*buf, 8)?;
    Ok(buf.get_f64())
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(ShelfError::Codec(format!(
            "need {needed} bytes, {} remaining",
            buf.remaining()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_ordering() {
        assert_eq!(
            FieldValue::Int(1999).partial_cmp(&FieldValue::Int(2001)),
            Some(Ordering::Less)
        );
        assert_eq!(
            FieldValue::Int(2).partial_cmp(&FieldValue::Float(2.0)),
            Some(Ordering::Equal)
        );
        assert_eq!(
            FieldValue::from("b").partial_cmp(&FieldValue::from("a")),
            Some(Ordering::Greater)
        );
        assert_eq!(FieldValue::Int(1).partial_cmp(&FieldValue::from("1")), None);
    }

    #[test]
    fn test_string_codec() {
        let mut buf = Vec::new();
        put_str(&mut buf, "Twin Peaks").unwrap();
        put_str(&mut buf, "").unwrap();
        let mut slice = &buf[..];
        assert_eq!(get_str(&mut slice).unwrap(), "Twin Peaks");
        assert_eq!(get_str(&mut slice).unwrap(), "");
        assert!(get_str(&mut slice).is_err());
    }

    #[test]
    fn test_oversized_string_is_codec_error() {
        let mut buf = Vec::new();
        let longest = "x".repeat(u16::MAX as usize);
        put_str(&mut buf, &longest).unwrap();
        assert_eq!(get_str(&mut &buf[..]).unwrap().len(), u16::MAX as usize);

        let mut buf = Vec::new();
        let too_long = "x".repeat(70_000);
        assert!(matches!(put_str(&mut buf, &too_long), Err(ShelfError::Codec(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_short_input_is_codec_error() {
        let mut slice: &[u8] = &[0, 0, 1];
        assert!(matches!(get_i32(&mut slice), Err(ShelfError::Codec(_))));
    }
}
