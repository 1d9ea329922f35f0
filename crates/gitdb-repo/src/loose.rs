//! Loose object storage: zlib-compressed `"<kind> <size>\0<content>"`
//! files under `<gitdir>/objects/xx/yyyy...`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use gitdb_hash::hasher::Hasher;
use gitdb_hash::ObjectId;
use gitdb_object::{header, ObjectData, ObjectError, ObjectKind};

use crate::{RepoError, Repository};

impl Repository {
    /// The file path a loose object lives at.
    pub fn object_path(&self, oid: &ObjectId) -> PathBuf {
        self.objects_dir().join(oid.loose_path())
    }

    /// Whether a loose object exists.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.object_path(oid).is_file()
    }

    /// Read a loose object by identifier.
    ///
    /// Returns `Ok(None)` when the object does not exist and an error when
    /// it exists but cannot be decoded.
    pub fn open_object(&self, oid: &ObjectId) -> Result<Option<ObjectData>, RepoError> {
        let path = self.object_path(oid);
        let compressed = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RepoError::Io(e)),
        };

        let mut decoder = ZlibDecoder::new(&compressed[..]);
        let mut raw = Vec::new();
        decoder.read_to_end(&mut raw).map_err(|e| RepoError::Corrupt {
            oid: *oid,
            reason: format!("zlib: {e}"),
        })?;

        let (kind, size, header_len) = header::parse_header(&raw)?;
        let content = &raw[header_len..];
        if content.len() != size {
            return Err(RepoError::Corrupt {
                oid: *oid,
                reason: format!("size mismatch: header says {size}, got {}", content.len()),
            });
        }
        Ok(Some(ObjectData::new(kind, content.to_vec())))
    }

    /// Read a blob, failing when the object is absent or of another kind.
    pub fn open_blob(&self, oid: &ObjectId) -> Result<ObjectData, RepoError> {
        let data = self
            .open_object(oid)?
            .ok_or(ObjectError::MissingObject(*oid))?;
        if data.kind() != ObjectKind::Blob {
            return Err(ObjectError::IncorrectKind {
                oid: *oid,
                expected: ObjectKind::Blob,
                actual: data.kind(),
            }
            .into());
        }
        Ok(data)
    }

    /// Deflate and store a blob, returning its identifier.
    pub fn write_blob(&self, content: &[u8]) -> Result<ObjectId, RepoError> {
        self.write_object(ObjectKind::Blob, content)
    }

    /// Stage a working-tree file as a blob.
    pub fn write_blob_from_path(&self, file: impl AsRef<Path>) -> Result<ObjectId, RepoError> {
        let content = fs::read(file)?;
        self.write_blob(&content)
    }

    /// Write an object of the given kind. Idempotent: an object that
    /// already exists is not rewritten.
    pub fn write_object(&self, kind: ObjectKind, content: &[u8]) -> Result<ObjectId, RepoError> {
        let hdr = header::write_header(kind, content.len());

        let oid = {
            let mut hasher = Hasher::new();
            hasher.update(&hdr);
            hasher.update(content);
            hasher.finalize()?
        };

        if self.contains(&oid) {
            return Ok(oid);
        }

        let final_path = self.object_path(&oid);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write to a temp file in the objects dir (same filesystem, so the
        // final rename is atomic).
        let tmp_path = write_to_temp(self.objects_dir(), &hdr, content)?;
        finalize_object(&tmp_path, &final_path)?;

        Ok(oid)
    }

    fn objects_dir(&self) -> &Path {
        &self.objects_dir
    }
}

/// Compress header + content into a temp file under `objects_dir`.
///
/// The temp name mixes the process id with a nanosecond timestamp so
/// concurrent writers never share a path.
fn write_to_temp(objects_dir: &Path, hdr: &[u8], content: &[u8]) -> Result<PathBuf, RepoError> {
    fs::create_dir_all(objects_dir)?;
    let tmp_path = objects_dir.join(format!(
        "tmp_obj_{}",
        std::process::id()
            ^ std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
    ));

    let file = fs::File::create(&tmp_path)?;
    let mut encoder = ZlibEncoder::new(file, Compression::default());
    encoder.write_all(hdr)?;
    encoder.write_all(content)?;
    encoder.finish()?;

    Ok(tmp_path)
}

/// Atomically move a temp file to its final destination.
///
/// Losing the rename race to another writer is fine: the content is
/// identical by construction, so the temp file is simply discarded.
fn finalize_object(tmp: &Path, final_path: &Path) -> Result<(), RepoError> {
    match fs::rename(tmp, final_path) {
        Ok(()) => Ok(()),
        Err(_) if final_path.exists() => {
            let _ = fs::remove_file(tmp);
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_file(tmp);
            Err(RepoError::Io(e))
        }
    }
}
