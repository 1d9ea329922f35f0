//! The staging area: an ordered map from working-tree paths to blob
//! identifiers plus a stat cache, persisted in git's binary index format
//! (version 2).
//!
//! Reading loads the whole file; writing goes through the
//! `<index>.lock` / `<index>.tmp` protocol so readers never observe a torn
//! file and concurrent writers fail fast instead of waiting.

pub mod entry;
mod read;
mod workdir;
mod write;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::SystemTime;

use bstr::{BStr, BString};
use gitdb_hash::HashError;
use gitdb_object::ObjectError;
use gitdb_repo::RepoError;

pub use entry::{IndexEntry, StatData};

/// Errors from index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("bad index signature")]
    BadSignature,

    #[error("unsupported index version: {0}")]
    UnsupportedVersion(u32),

    #[error("truncated index entry at offset {offset}")]
    TruncatedEntry { offset: usize },

    #[error("index file is in use")]
    IndexInUse,

    #[error("cannot write an index with unmerged paths")]
    UnmergedPaths,

    #[error("path {0} is not under the working directory")]
    OutsideWorkdir(BString),

    #[error("no index entry for {0}")]
    UnknownPath(BString),

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The staging area.
///
/// Entries are keyed by their raw path bytes; `BString`'s ordering is the
/// unsigned-byte lexicographic collation the on-disk format requires, so
/// iteration order and write order coincide.
pub struct Index {
    entries: BTreeMap<BString, IndexEntry>,
    /// Entries were added, removed, or rewritten since the last read/write.
    changed: bool,
    /// Only cached stat data was refreshed; content is unchanged.
    stat_dirty: bool,
    /// Mtime of the on-disk file when it was last read or written.
    last_cache_time: Option<SystemTime>,
}

impl Index {
    /// Create an empty in-memory index.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            changed: false,
            stat_dirty: false,
            last_cache_time: None,
        }
    }

    /// Read the index from disk. A missing file yields an empty index.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(IndexError::Io(e)),
        };
        let entries = read::parse(&data)?;
        let last_cache_time = fs::metadata(path)?.modified().ok();
        Ok(Self {
            entries,
            changed: false,
            stat_dirty: false,
            last_cache_time,
        })
    }

    /// Write the index to disk with the lockfile protocol, refusing when
    /// any entry is unmerged.
    pub fn write_to(&mut self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        write::write_index(self, path.as_ref())?;
        self.changed = false;
        self.stat_dirty = false;
        self.last_cache_time = fs::metadata(path.as_ref())?.modified().ok();
        Ok(())
    }

    /// Reload from disk only when the backing file's mtime differs from
    /// the one recorded at the last read. Returns whether a reload
    /// happened.
    pub fn reread_if_necessary(&mut self, path: impl AsRef<Path>) -> Result<bool, IndexError> {
        let path = path.as_ref();
        let disk_mtime = fs::metadata(path).and_then(|m| m.modified()).ok();
        if disk_mtime == self.last_cache_time {
            return Ok(false);
        }
        *self = Self::read_from(path)?;
        Ok(true)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries were added, removed, or rewritten since the last
    /// read/write.
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Cached stat data was refreshed without a content change.
    pub fn is_stat_dirty(&self) -> bool {
        self.stat_dirty
    }

    /// Look up an entry by its path key.
    pub fn entry(&self, path: &BStr) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    /// All entries in ascending unsigned-byte key order.
    pub fn members(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Insert or replace an entry, keyed by its path.
    pub fn add_entry(&mut self, entry: IndexEntry) {
        self.entries.insert(entry.path.clone(), entry);
        self.changed = true;
    }

    /// Remove an entry by path. Returns whether one was present.
    pub fn remove_path(&mut self, path: &BStr) -> bool {
        let removed = self.entries.remove(path).is_some();
        if removed {
            self.changed = true;
        }
        removed
    }

    /// Whether any entry carries a non-zero merge stage.
    pub fn has_unmerged(&self) -> bool {
        self.entries.values().any(|e| e.stage() != 0)
    }

    fn entries_mut(&mut self) -> &mut BTreeMap<BString, IndexEntry> {
        &mut self.entries
    }

    pub(crate) fn mark_changed(&mut self) {
        self.changed = true;
    }

    pub(crate) fn mark_stat_dirty(&mut self) {
        self.stat_dirty = true;
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}
