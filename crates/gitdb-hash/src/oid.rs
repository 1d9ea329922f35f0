use std::fmt;
use std::str::FromStr;

use crate::HashError;

/// The number of raw bytes in an object identifier.
pub const RAW_LEN: usize = 20;

/// The number of hex characters in an object identifier.
pub const HEX_LEN: usize = 40;

/// A content-addressed object identifier: the SHA-1 of an object's
/// serialized form.
///
/// Identifiers are immutable values; equality is byte-wise and ordering is
/// unsigned lexicographic on the raw bytes. The all-zeros identifier is the
/// distinguished "absent" value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; RAW_LEN]);

/// Lookup table: ASCII byte → nibble value (255 = invalid).
const HEX_DECODE: [u8; 256] = {
    let mut table = [255u8; 256];
    let mut i = 0u8;
    loop {
        match i {
            b'0'..=b'9' => table[i as usize] = i - b'0',
            b'a'..=b'f' => table[i as usize] = i - b'a' + 10,
            b'A'..=b'F' => table[i as usize] = i - b'A' + 10,
            _ => {}
        }
        if i == 255 {
            break;
        }
        i += 1;
    }
    table
};

const HEX_ENCODE: &[u8; 16] = b"0123456789abcdef";

impl ObjectId {
    /// The null identifier (all zeros), meaning "absent".
    pub const NULL: Self = Self([0u8; RAW_LEN]);

    /// Create an identifier from exactly 20 raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != RAW_LEN {
            return Err(HashError::InvalidLength {
                expected: RAW_LEN,
                actual: bytes.len(),
            });
        }
        let mut raw = [0u8; RAW_LEN];
        raw.copy_from_slice(bytes);
        Ok(Self(raw))
    }

    /// Create an identifier from a raw array.
    pub const fn from_raw(raw: [u8; RAW_LEN]) -> Self {
        Self(raw)
    }

    /// Parse an identifier from 40 hex characters (either case).
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let hex = hex.as_bytes();
        if hex.len() != HEX_LEN {
            return Err(HashError::InvalidHexLength {
                expected: HEX_LEN,
                actual: hex.len(),
            });
        }
        let mut raw = [0u8; RAW_LEN];
        for (i, byte) in raw.iter_mut().enumerate() {
            let hi = HEX_DECODE[hex[i * 2] as usize];
            let lo = HEX_DECODE[hex[i * 2 + 1] as usize];
            if hi == 255 {
                return Err(HashError::InvalidHex {
                    position: i * 2,
                    character: hex[i * 2] as char,
                });
            }
            if lo == 255 {
                return Err(HashError::InvalidHex {
                    position: i * 2 + 1,
                    character: hex[i * 2 + 1] as char,
                });
            }
            *byte = (hi << 4) | lo;
        }
        Ok(Self(raw))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The lowercase hex form.
    pub fn to_hex(&self) -> String {
        let mut buf = vec![0u8; HEX_LEN];
        for (i, &b) in self.0.iter().enumerate() {
            buf[i * 2] = HEX_ENCODE[(b >> 4) as usize];
            buf[i * 2 + 1] = HEX_ENCODE[(b & 0x0f) as usize];
        }
        // SAFETY: only ASCII hex digits were written.
        unsafe { String::from_utf8_unchecked(buf) }
    }

    /// Whether this is the null (all-zeros) identifier.
    pub fn is_null(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The first digest byte, used for fan-out table indexing.
    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// The loose object path component: `"xx/xxxx..."`.
    pub fn loose_path(&self) -> String {
        let hex = self.to_hex();
        format!("{}/{}", &hex[..2], &hex[2..])
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", &self.to_hex()[..8])
    }
}

impl FromStr for ObjectId {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const EMPTY_BLOB_HEX: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn hex_roundtrip() {
        let oid = ObjectId::from_hex(EMPTY_BLOB_HEX).unwrap();
        assert_eq!(oid.to_hex(), EMPTY_BLOB_HEX);
        let parsed: ObjectId = oid.to_string().parse().unwrap();
        assert_eq!(parsed, oid);
    }

    #[test]
    fn hex_is_case_insensitive() {
        let lower = ObjectId::from_hex("da39a3ee5e6b4b0d3255bfef95601890afd80709").unwrap();
        let upper = ObjectId::from_hex("DA39A3EE5E6B4B0D3255BFEF95601890AFD80709").unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn invalid_hex_char() {
        let err = ObjectId::from_hex("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").unwrap_err();
        assert!(matches!(err, HashError::InvalidHex { position: 0, .. }));
    }

    #[test]
    fn invalid_hex_length() {
        let err = ObjectId::from_hex("abcd").unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidHexLength {
                expected: 40,
                actual: 4
            }
        ));
    }

    #[test]
    fn from_bytes_wrong_length() {
        let err = ObjectId::from_bytes(&[0u8; 19]).unwrap_err();
        assert!(matches!(
            err,
            HashError::InvalidLength {
                expected: 20,
                actual: 19
            }
        ));
    }

    #[test]
    fn null_is_absent() {
        assert!(ObjectId::NULL.is_null());
        let real = ObjectId::from_hex(EMPTY_BLOB_HEX).unwrap();
        assert!(!real.is_null());
    }

    #[test]
    fn ordering_is_unsigned_lexicographic() {
        let low = ObjectId::from_hex("00ffffffffffffffffffffffffffffffffffffff").unwrap();
        let high = ObjectId::from_hex("0100000000000000000000000000000000000000").unwrap();
        let top = ObjectId::from_hex("ff00000000000000000000000000000000000000").unwrap();
        assert!(low < high);
        assert!(high < top);
    }

    #[test]
    fn debug_shows_short_hash() {
        let oid = ObjectId::from_hex(EMPTY_BLOB_HEX).unwrap();
        assert_eq!(format!("{oid:?}"), "ObjectId(e69de29b)");
    }

    #[test]
    fn usable_as_map_key() {
        let oid = ObjectId::from_hex(EMPTY_BLOB_HEX).unwrap();
        let mut map = HashMap::new();
        map.insert(oid, 1);
        assert_eq!(map.get(&oid), Some(&1));
    }

    #[test]
    fn first_byte_and_loose_path() {
        let oid = ObjectId::from_hex(EMPTY_BLOB_HEX).unwrap();
        assert_eq!(oid.first_byte(), 0xe6);
        assert_eq!(
            oid.loose_path(),
            "e6/9de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }
}
