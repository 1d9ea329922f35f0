//! Index file writing and index → tree materialization.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bstr::BString;
use gitdb_hash::hasher::Hasher;
use gitdb_hash::ObjectId;
use gitdb_object::{EntryId, Tree};
use gitdb_repo::Repository;
use gitdb_utils::{LockFile, UtilError};

use crate::read::record_len;
use crate::{Index, IndexError};

/// Write the index to `path` under the single-writer protocol:
///
/// 1. Exclusively create `<path>.lock`; a pre-existing lock means another
///    writer owns the index and is left untouched.
/// 2. Stream the body into `<path>.tmp`, teeing every byte through a
///    SHA-1, and append the digest.
/// 3. Remove the old index and rename the temp file into place.
/// 4. The lock (and a temp file left by a failure) is removed on every
///    exit path.
pub(crate) fn write_index(index: &Index, path: &Path) -> Result<(), IndexError> {
    if index.has_unmerged() {
        return Err(IndexError::UnmergedPaths);
    }

    let _lock = LockFile::acquire(path).map_err(|e| match e {
        UtilError::AlreadyLocked { .. } => IndexError::IndexInUse,
        UtilError::LockCreate { source, .. } => IndexError::Io(source),
        UtilError::Io(source) => IndexError::Io(source),
    })?;

    let tmp_path = PathBuf::from(format!("{}.tmp", path.display()));
    let result = write_body(index, &tmp_path, path);
    if result.is_err() && tmp_path.exists() {
        let _ = fs::remove_file(&tmp_path);
    }
    // The lock guard removes `<path>.lock` as it drops.
    result
}

fn write_body(index: &Index, tmp_path: &Path, final_path: &Path) -> Result<(), IndexError> {
    let file = fs::File::create(tmp_path)?;
    let mut out = Tee {
        inner: BufWriter::new(file),
        hasher: Hasher::new(),
    };

    out.write_all(b"DIRC")?;
    out.write_all(&2u32.to_be_bytes())?;
    out.write_all(&(index.len() as u32).to_be_bytes())?;

    // The map iterates in ascending key order, which is the write order.
    const PADDING: [u8; 8] = [0u8; 8];
    for entry in index.members() {
        out.write_all(&entry.stat.ctime_secs.to_be_bytes())?;
        out.write_all(&entry.stat.ctime_nsecs.to_be_bytes())?;
        out.write_all(&entry.stat.mtime_secs.to_be_bytes())?;
        out.write_all(&entry.stat.mtime_nsecs.to_be_bytes())?;
        out.write_all(&entry.stat.dev.to_be_bytes())?;
        out.write_all(&entry.stat.ino.to_be_bytes())?;
        out.write_all(&entry.mode.to_be_bytes())?;
        out.write_all(&entry.stat.uid.to_be_bytes())?;
        out.write_all(&entry.stat.gid.to_be_bytes())?;
        out.write_all(&entry.stat.size.to_be_bytes())?;
        out.write_all(entry.oid.as_bytes())?;
        out.write_all(&entry.flags_on_disk().to_be_bytes())?;
        out.write_all(&entry.path)?;
        let pad = record_len(entry.path.len()) - 62 - entry.path.len();
        out.write_all(&PADDING[..pad])?;
    }

    let digest = out.hasher.finalize()?;
    let mut inner = out.inner;
    inner.write_all(digest.as_bytes())?;
    let file = inner
        .into_inner()
        .map_err(|e| IndexError::Io(e.into_error()))?;
    file.sync_all()?;
    drop(file);

    if final_path.exists() {
        fs::remove_file(final_path)?;
    }
    fs::rename(tmp_path, final_path)?;
    Ok(())
}

/// Tees every written byte through a streaming SHA-1.
struct Tee<W: Write> {
    inner: W,
    hasher: Hasher,
}

impl<W: Write> Write for Tee<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl Index {
    /// Materialize the staged entries as tree objects, returning the root
    /// tree's identifier. Refuses when any entry is unmerged.
    ///
    /// Entries are walked in sorted order with a stack of open trees: when
    /// the path prefix shrinks, the finished subtrees are written out
    /// deepest-first; when it grows, subtrees are opened (reusing an
    /// existing member of the parent when one is already there).
    pub fn write_tree(&self, repo: &Repository) -> Result<ObjectId, IndexError> {
        if self.has_unmerged() {
            return Err(IndexError::UnmergedPaths);
        }

        let mut tree = Tree::new();
        let mut stack: Vec<EntryId> = vec![tree.root()];
        let mut prev: Vec<BString> = Vec::new();

        for entry in self.members() {
            let components: Vec<BString> = entry
                .path
                .split(|&b| b == b'/')
                .map(BString::from)
                .collect();
            let Some((leaf, dirs)) = components.split_last() else {
                continue;
            };

            // Longest common directory prefix with the previous entry.
            let limit = prev.len().saturating_sub(1).min(dirs.len());
            let mut common = 0;
            while common < limit && prev[common] == components[common] {
                common += 1;
            }

            // Close trees the new path no longer shares.
            while stack.len() > common + 1 {
                let done = stack.pop().expect("stack holds at least the root");
                repo.write_tree(&mut tree, done)?;
            }

            // Open the remaining directories of this path.
            while stack.len() < dirs.len() + 1 {
                let parent = *stack.last().expect("stack holds at least the root");
                let sub = tree.ensure_subtree(parent, &dirs[stack.len() - 1])?;
                stack.push(sub);
            }

            let parent = *stack.last().expect("stack holds at least the root");
            tree.put_file(parent, leaf, entry.oid, entry.is_executable())?;
            prev = components;
        }

        while stack.len() > 1 {
            let done = stack.pop().expect("stack holds at least the root");
            repo.write_tree(&mut tree, done)?;
        }
        let root = tree.root();
        Ok(repo.write_tree(&mut tree, root)?)
    }
}
