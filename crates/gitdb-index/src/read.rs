//! Index file parsing (format version 2).

use std::collections::BTreeMap;

use bstr::BString;
use gitdb_hash::ObjectId;

use crate::entry::{IndexEntry, StatData, NAME_MASK};
use crate::IndexError;

/// Magic bytes at the start of every index file.
const SIGNATURE: &[u8; 4] = b"DIRC";

/// Format version this core reads and writes.
const VERSION: u32 = 2;

/// Fixed-size portion of a version-2 entry record:
/// stat (40) + identifier (20) + flags (2).
const FIXED_ENTRY_LEN: usize = 62;

/// Total on-disk record size: the fixed part plus the name, NUL-padded to
/// an 8-byte boundary from the start of the record (always at least one
/// padding byte).
pub(crate) fn record_len(name_len: usize) -> usize {
    (FIXED_ENTRY_LEN + name_len + 8) & !7
}

/// Parse an index file into its entry map.
///
/// Extensions after the entries (tree cache and friends) are ignored; the
/// trailing digest is not verified here.
pub(crate) fn parse(data: &[u8]) -> Result<BTreeMap<BString, IndexEntry>, IndexError> {
    if data.len() < 12 {
        return Err(IndexError::BadSignature);
    }
    if &data[0..4] != SIGNATURE {
        return Err(IndexError::BadSignature);
    }
    let version = read_u32(&data[4..]);
    if version != VERSION {
        return Err(IndexError::UnsupportedVersion(version));
    }
    let entry_count = read_u32(&data[8..]) as usize;

    let mut entries = BTreeMap::new();
    let mut cursor = 12;
    for _ in 0..entry_count {
        let (entry, next) = parse_entry(data, cursor)?;
        entries.insert(entry.path.clone(), entry);
        cursor = next;
    }
    Ok(entries)
}

fn parse_entry(data: &[u8], start: usize) -> Result<(IndexEntry, usize), IndexError> {
    if start + FIXED_ENTRY_LEN > data.len() {
        return Err(IndexError::TruncatedEntry { offset: start });
    }

    let stat = StatData {
        ctime_secs: read_u32(&data[start..]),
        ctime_nsecs: read_u32(&data[start + 4..]),
        mtime_secs: read_u32(&data[start + 8..]),
        mtime_nsecs: read_u32(&data[start + 12..]),
        dev: read_u32(&data[start + 16..]),
        ino: read_u32(&data[start + 20..]),
        uid: read_u32(&data[start + 28..]),
        gid: read_u32(&data[start + 32..]),
        size: read_u32(&data[start + 36..]),
    };
    let mode = read_u32(&data[start + 24..]);

    let oid = ObjectId::from_bytes(&data[start + 40..start + 60])
        .map_err(|_| IndexError::TruncatedEntry { offset: start })?;
    let flags = read_u16(&data[start + 60..]);

    // The name-length field is authoritative below the clamp; at the clamp
    // the real name runs to its NUL terminator.
    let name_start = start + FIXED_ENTRY_LEN;
    let name_len_field = (flags & NAME_MASK) as usize;
    let name_len = if name_len_field < NAME_MASK as usize {
        name_len_field
    } else {
        data[name_start..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(IndexError::TruncatedEntry { offset: name_start })?
    };

    let record = record_len(name_len);
    if start + record > data.len() {
        return Err(IndexError::TruncatedEntry { offset: start });
    }
    let path = BString::from(&data[name_start..name_start + name_len]);

    let entry = IndexEntry {
        path,
        oid,
        mode,
        stat,
        flags,
    };
    Ok((entry, start + record))
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

fn read_u16(data: &[u8]) -> u16 {
    u16::from_be_bytes([data[0], data[1]])
}
