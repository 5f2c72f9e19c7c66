//! Fixed-width key codecs for the index structures.
//!
//! Index pages and buckets have a fixed byte size, so every key type
//! declares its encoded width up front. `empty()` replaces runtime
//! construction of a blank key when a page slot is read back unused.

use std::fmt::{self, Debug, Display};

/// A key that can be stored in a B+Tree page or hash bucket.
pub trait IndexKey: Ord + Clone + Debug {
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// A placeholder key used for unused page slots.
    fn empty() -> Self;

    /// Writes exactly `WIDTH` bytes into `buf[..WIDTH]`.
    fn write_to(&self, buf: &mut [u8]);

    /// Reads a key from `buf[..WIDTH]`.
    fn read_from(buf: &[u8]) -> Self;

    /// Encodes the key into a fresh buffer.
    fn to_key_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::WIDTH];
        self.write_to(&mut buf);
        buf
    }
}

macro_rules! int_key {
    ($($t:ty),*) => {
        $(
            impl IndexKey for $t {
                const WIDTH: usize = std::mem::size_of::<$t>();

                fn empty() -> Self {
                    0
                }

                fn write_to(&self, buf: &mut [u8]) {
                    buf[..Self::WIDTH].copy_from_slice(&self.to_be_bytes());
                }

                fn read_from(buf: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&buf[..Self::WIDTH]);
                    <$t>::from_be_bytes(raw)
                }
            }
        )*
    };
}

int_key!(i32, i64, u32, u64);

/// A composite key, ordered by its first component and then its second.
///
/// Useful for non-unique secondary keys in the B+Tree, e.g. `(title, id)`.
impl<A: IndexKey, B: IndexKey> IndexKey for (A, B) {
    const WIDTH: usize = A::WIDTH + B::WIDTH;

    fn empty() -> Self {
        (A::empty(), B::empty())
    }

    fn write_to(&self, buf: &mut [u8]) {
        self.0.write_to(&mut buf[..A::WIDTH]);
        self.1.write_to(&mut buf[A::WIDTH..Self::WIDTH]);
    }

    fn read_from(buf: &[u8]) -> Self {
        (A::read_from(&buf[..A::WIDTH]), B::read_from(&buf[A::WIDTH..Self::WIDTH]))
    }
}

/// A string key stored in exactly `N` bytes, zero padded.
///
/// Longer strings are truncated on a character boundary.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FixedString<const N: usize>(String);

impl<const N: usize> FixedString<N> {
    pub fn new(s: &str) -> Self {
        let mut end = s.len().min(N);
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        Self(s[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<const N: usize> From<&str> for FixedString<N> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<const N: usize> Debug for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl<const N: usize> Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<const N: usize> IndexKey for FixedString<N> {
    const WIDTH: usize = N;

    fn empty() -> Self {
        Self(String::new())
    }

    fn write_to(&self, buf: &mut [u8]) {
        let bytes = self.0.as_bytes();
        buf[..bytes.len()].copy_from_slice(bytes);
        buf[bytes.len()..N].fill(0);
    }

    fn read_from(buf: &[u8]) -> Self {
        let raw = &buf[..N];
        let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
        Self(String::from_utf8_lossy(&raw[..end]).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<K: IndexKey>(key: K) -> K {
        K::read_from(&key.to_key_bytes())
    }

    #[test]
    fn test_int_key_width() {
        assert_eq!(<i32 as IndexKey>::WIDTH, 4);
        assert_eq!(<u64 as IndexKey>::WIDTH, 8);
        assert_eq!(roundtrip(-42i32), -42);
        assert_eq!(roundtrip(u64::MAX), u64::MAX);
    }

    #[test]
    fn test_fixed_string_truncates_on_char_boundary() {
        let key: FixedString<4> = FixedString::new("caf\u{e9}s");
        // "caf" + 2-byte e-acute does not fit in 4 bytes
        assert_eq!(key.as_str(), "caf");
        assert_eq!(roundtrip(key.clone()), key);
    }

    #[test]
    fn test_fixed_string_ordering() {
        let a: FixedString<8> = "alpha".into();
        let b: FixedString<8> = "beta".into();
        assert!(a < b);
        assert_eq!(FixedString::<8>::empty().as_str(), "");
    }

    #[test]
    fn test_composite_key() {
        type Key = (FixedString<6>, i32);
        assert_eq!(<Key as IndexKey>::WIDTH, 10);
        let key: Key = ("drama".into(), 7);
        assert_eq!(roundtrip(key.clone()), key);
        let lower: Key = ("drama".into(), 1);
        assert!(lower < key);
    }
}
