//! Index entry types: the per-path record and its cached stat data.

use std::time::{SystemTime, UNIX_EPOCH};

use bstr::BString;
use gitdb_hash::ObjectId;
use gitdb_object::FileMode;

/// Flag bit: do not probe the filesystem for changes.
const ASSUME_VALID: u16 = 0x8000;
/// Flag bit: the working-tree file is known to need an update.
const UPDATE_NEEDED: u16 = 0x4000;
/// Merge stage, two bits.
const STAGE_MASK: u16 = 0x3000;
const STAGE_SHIFT: u16 = 12;
/// Name length, clamped to 0xFFF for longer paths.
pub(crate) const NAME_MASK: u16 = 0x0FFF;

/// Filesystem stat data cached in the index for change detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatData {
    pub ctime_secs: u32,
    pub ctime_nsecs: u32,
    pub mtime_secs: u32,
    pub mtime_nsecs: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    /// File size, truncated to 32 bits as the format demands.
    pub size: u32,
}

impl StatData {
    /// Stamp from filesystem metadata. Both timestamps come from the
    /// file's mtime, scaled to nanoseconds.
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .unwrap_or_default();

        Self {
            ctime_secs: mtime.as_secs() as u32,
            ctime_nsecs: mtime.subsec_nanos(),
            mtime_secs: mtime.as_secs() as u32,
            mtime_nsecs: mtime.subsec_nanos(),
            dev: dev_of(meta),
            ino: ino_of(meta),
            uid: uid_of(meta),
            gid: gid_of(meta),
            size: meta.len() as u32,
        }
    }

    /// The cached mtime as a point in time.
    pub fn mtime(&self) -> SystemTime {
        UNIX_EPOCH
            + std::time::Duration::new(u64::from(self.mtime_secs), self.mtime_nsecs)
    }
}

#[cfg(unix)]
fn dev_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.dev() as u32
}

#[cfg(unix)]
fn ino_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.ino() as u32
}

#[cfg(unix)]
fn uid_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.uid()
}

#[cfg(unix)]
fn gid_of(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.gid()
}

#[cfg(not(unix))]
fn dev_of(_meta: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(not(unix))]
fn ino_of(_meta: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(not(unix))]
fn uid_of(_meta: &std::fs::Metadata) -> u32 {
    0
}

#[cfg(not(unix))]
fn gid_of(_meta: &std::fs::Metadata) -> u32 {
    0
}

/// A single staging-area record: one working-tree path mapped to a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Workdir-relative POSIX path (the map key, duplicated here).
    pub path: BString,
    /// Blob identifier of the staged content.
    pub oid: ObjectId,
    /// Raw mode bits as stored on disk.
    pub mode: u32,
    /// Cached stat data.
    pub stat: StatData,
    /// The 16-bit flag word: assume-valid, update-needed, stage, and the
    /// name length (recomputed on write).
    pub flags: u16,
}

impl IndexEntry {
    /// Create a minimal merged (stage 0) regular-file entry.
    pub fn new(path: impl Into<BString>, oid: ObjectId) -> Self {
        let path = path.into();
        let flags = path.len().min(NAME_MASK as usize) as u16;
        Self {
            path,
            oid,
            mode: FileMode::Regular.bits(),
            stat: StatData::default(),
            flags,
        }
    }

    /// The merge stage: 0 merged, 1 base, 2 ours, 3 theirs.
    pub fn stage(&self) -> u8 {
        ((self.flags & STAGE_MASK) >> STAGE_SHIFT) as u8
    }

    pub fn set_stage(&mut self, stage: u8) {
        self.flags = (self.flags & !STAGE_MASK) | ((u16::from(stage) & 0x3) << STAGE_SHIFT);
    }

    /// Whether change detection should be skipped for this entry.
    pub fn is_assume_valid(&self) -> bool {
        self.flags & ASSUME_VALID != 0
    }

    pub fn set_assume_valid(&mut self, on: bool) {
        if on {
            self.flags |= ASSUME_VALID;
        } else {
            self.flags &= !ASSUME_VALID;
        }
    }

    /// Whether the working-tree file is already known to be stale.
    pub fn is_update_needed(&self) -> bool {
        self.flags & UPDATE_NEEDED != 0
    }

    pub fn set_update_needed(&mut self, on: bool) {
        if on {
            self.flags |= UPDATE_NEEDED;
        } else {
            self.flags &= !UPDATE_NEEDED;
        }
    }

    /// Whether the staged mode carries the executable bit.
    pub fn is_executable(&self) -> bool {
        FileMode::Executable.matches(self.mode)
    }

    /// The flag word as serialized: stored bits with the name-length field
    /// recomputed from the path.
    pub(crate) fn flags_on_disk(&self) -> u16 {
        (self.flags & !NAME_MASK) | self.path.len().min(NAME_MASK as usize) as u16
    }
}
