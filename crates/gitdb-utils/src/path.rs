//! Workdir path normalization.
//!
//! Git stores paths with forward slashes regardless of platform; these
//! helpers produce that internal form from host paths.

use std::path::Path;

use bstr::{BString, ByteVec};

/// Normalize directory separators to `/`.
///
/// A no-op on POSIX input; backslashes from Windows-style paths are
/// rewritten in place.
pub fn internal_slash(path: impl AsRef<[u8]>) -> BString {
    let mut out = BString::from(path.as_ref());
    for b in out.iter_mut() {
        if *b == b'\\' {
            *b = b'/';
        }
    }
    out
}

/// Compute the workdir-relative form of `file` in `/`-separated bytes.
///
/// Returns an empty string when `file` does not live under `workdir`.
pub fn strip_work_dir(workdir: impl AsRef<Path>, file: impl AsRef<Path>) -> BString {
    match file.as_ref().strip_prefix(workdir.as_ref()) {
        Ok(rel) => {
            let mut out = BString::from(Vec::new());
            for component in rel.components() {
                if !out.is_empty() {
                    out.push_byte(b'/');
                }
                out.push_str(component.as_os_str().to_string_lossy().as_bytes());
            }
            out
        }
        Err(_) => BString::from(Vec::new()),
    }
}
