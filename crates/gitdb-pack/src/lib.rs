//! Pack file reading.
//!
//! A pack bundles many zlib-deflated objects behind a 12-byte header; its
//! `.idx` sidecar (legacy format) maps identifiers to pack offsets through
//! a 256-way fan-out table. This crate reads both: random access by
//! identifier and sequential iteration over every record. Delta
//! reconstruction is out of scope: REF_DELTA records surface their base
//! identifier for the caller to resolve, and relative-offset deltas are
//! rejected outright.

mod entry;
mod index;
mod reader;

pub use entry::{EntryKind, PackEntry};
pub use index::PackIndex;
pub use reader::{Entries, PackReader};

use gitdb_hash::HashError;

/// Errors from pack reading.
#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("invalid pack header: {0}")]
    BadPackHeader(String),

    #[error("unsupported pack version: {0}")]
    UnsupportedVersion(u32),

    #[error("invalid pack index: {0}")]
    BadIndex(String),

    #[error("unsupported pack entry type {kind} at offset {offset}")]
    UnsupportedEntryKind { kind: u8, offset: u64 },

    #[error("corrupt pack entry at offset {0}")]
    CorruptEntry(u64),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Pack format constants.
pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_HEADER_LEN: u64 = 12;
