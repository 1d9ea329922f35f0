//! Working-tree synchronization: staging files, change detection, and
//! checkout.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bstr::{BStr, BString};
use gitdb_hash::hasher::Hasher;
use gitdb_object::FileMode;
use gitdb_repo::Repository;

use crate::entry::StatData;
use crate::{Index, IndexEntry, IndexError};

/// Fallback for an unset `core.filemode`: filesystems off unix do not
/// track the executable bit.
const DEFAULT_FILEMODE: bool = cfg!(unix);

impl Index {
    /// Stage a working-tree file: write its content as a blob and upsert
    /// the entry under the workdir-relative key.
    ///
    /// The executable bit is recorded only when `core.filemode` is on and
    /// the filesystem reports it.
    pub fn add(
        &mut self,
        workdir: &Path,
        file: &Path,
        repo: &Repository,
    ) -> Result<&IndexEntry, IndexError> {
        let key = Repository::strip_work_dir(workdir, file);
        if key.is_empty() {
            return Err(IndexError::OutsideWorkdir(BString::from(
                file.to_string_lossy().as_bytes(),
            )));
        }

        let meta = fs::metadata(file)?;
        let oid = repo.write_blob_from_path(file)?;
        let filemode = repo.config().get_bool("core", None, "filemode", DEFAULT_FILEMODE);
        let executable = filemode && fs_executable(&meta);
        let mode = if executable {
            FileMode::Executable.bits()
        } else {
            FileMode::Regular.bits()
        };

        let stat = StatData::from_metadata(&meta);
        match self.entries_mut().get_mut(&key) {
            Some(existing) => {
                existing.oid = oid;
                existing.mode = mode;
                existing.stat = stat;
            }
            None => {
                let mut entry = IndexEntry::new(key.clone(), oid);
                entry.mode = mode;
                entry.stat = stat;
                self.entries_mut().insert(key.clone(), entry);
            }
        }
        self.mark_changed();
        Ok(self
            .entry(key.as_ref())
            .expect("entry was just inserted"))
    }

    /// Whether the working-tree file behind an entry differs from the
    /// staged state.
    ///
    /// Without `force_content_check` the answer is conservative: a
    /// mismatched mtime counts as modified without re-reading the file.
    /// With it, a final content hash decides.
    pub fn is_modified(
        &self,
        entry: &IndexEntry,
        workdir: &Path,
        force_content_check: bool,
        repo: &Repository,
    ) -> Result<bool, IndexError> {
        if entry.is_assume_valid() {
            return Ok(false);
        }
        if entry.is_update_needed() {
            return Ok(true);
        }

        let file = work_path(workdir, entry.path.as_ref());
        let meta = match fs::metadata(&file) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(IndexError::Io(e)),
        };

        // Mode coherence. Symlink entries are reported modified without
        // further probing; tree entries reduce to a directory existence
        // test.
        if FileMode::Symlink.matches(entry.mode) {
            return Ok(true);
        }
        if FileMode::Tree.matches(entry.mode) {
            return Ok(!meta.is_dir());
        }
        if !meta.is_file() {
            return Ok(true);
        }
        let filemode = repo.config().get_bool("core", None, "filemode", DEFAULT_FILEMODE);
        if filemode && entry.is_executable() != fs_executable(&meta) {
            return Ok(true);
        }

        if entry.stat.size != meta.len() as u32 {
            return Ok(true);
        }

        // A stored mtime without nanoseconds came from a filesystem that
        // only records whole seconds; compare at that granularity.
        let (fs_secs, fs_nsecs) = mtime_parts(&meta);
        let mtime_differs = if entry.stat.mtime_nsecs == 0 {
            entry.stat.mtime_secs != fs_secs
        } else {
            entry.stat.mtime_secs != fs_secs || entry.stat.mtime_nsecs != fs_nsecs
        };
        if !mtime_differs {
            return Ok(false);
        }
        if !force_content_check {
            return Ok(true);
        }

        let content = fs::read(&file)?;
        let actual = Hasher::hash_object("blob", &content)?;
        Ok(actual != entry.oid)
    }

    /// Write every merged (stage 0) entry back into the working tree.
    pub fn checkout(&mut self, repo: &Repository, workdir: &Path) -> Result<(), IndexError> {
        let keys: Vec<BString> = self
            .members()
            .filter(|e| e.stage() == 0)
            .map(|e| e.path.clone())
            .collect();
        for key in keys {
            self.checkout_entry(repo, workdir, key.as_ref())?;
        }
        Ok(())
    }

    /// Write one entry's blob into the working tree: create parent
    /// directories, truncate-replace the file, apply the executable bit,
    /// and re-stamp the entry's timestamps from the written file so it is
    /// not immediately reported modified.
    pub fn checkout_entry(
        &mut self,
        repo: &Repository,
        workdir: &Path,
        path: &BStr,
    ) -> Result<(), IndexError> {
        let (oid, executable) = {
            let entry = self
                .entry(path)
                .ok_or_else(|| IndexError::UnknownPath(BString::from(path)))?;
            (entry.oid, entry.is_executable())
        };

        let blob = repo.open_blob(&oid)?;
        let file = work_path(workdir, path);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut out = fs::File::create(&file)?;
        out.write_all(blob.bytes())?;
        out.sync_all()?;
        drop(out);

        let filemode = repo.config().get_bool("core", None, "filemode", DEFAULT_FILEMODE);
        if filemode {
            apply_executable_bit(&file, executable)?;
        }

        let meta = fs::metadata(&file)?;
        if let Some(entry) = self.entries_mut().get_mut(path) {
            entry.stat = StatData::from_metadata(&meta);
        }
        self.mark_stat_dirty();
        Ok(())
    }
}

/// Join a workdir root with a `/`-separated byte key.
fn work_path(workdir: &Path, key: &BStr) -> PathBuf {
    let mut path = workdir.to_path_buf();
    for component in key.split(|&b| b == b'/') {
        path.push(bytes_to_os(component));
    }
    path
}

#[cfg(unix)]
fn bytes_to_os(bytes: &[u8]) -> std::ffi::OsString {
    use std::os::unix::ffi::OsStrExt;
    std::ffi::OsStr::from_bytes(bytes).to_os_string()
}

#[cfg(not(unix))]
fn bytes_to_os(bytes: &[u8]) -> std::ffi::OsString {
    String::from_utf8_lossy(bytes).into_owned().into()
}

#[cfg(unix)]
fn fs_executable(meta: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn fs_executable(_meta: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn apply_executable_bit(file: &Path, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(file)?.permissions();
    let mode = perms.mode();
    let new_mode = if executable {
        mode | 0o111
    } else {
        mode & !0o111
    };
    if new_mode != mode {
        perms.set_mode(new_mode);
        fs::set_permissions(file, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn apply_executable_bit(_file: &Path, _executable: bool) -> std::io::Result<()> {
    Ok(())
}

fn mtime_parts(meta: &fs::Metadata) -> (u32, u32) {
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .unwrap_or_default();
    (mtime.as_secs() as u32, mtime.subsec_nanos())
}
