//! The pack reader: a seekable stream over a `.pack` file plus its index
//! sidecar.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use flate2::bufread::ZlibDecoder;
use gitdb_hash::ObjectId;

use crate::entry::read_header;
use crate::{PackEntry, PackError, PackIndex, PACK_HEADER_LEN, PACK_SIGNATURE};

/// Reader for one pack file.
///
/// Random access (`get`, `entry_at`, `inflate`) and sequential iteration
/// share the underlying stream; every operation takes the internal lock
/// because they all move the stream position.
pub struct PackReader {
    stream: Mutex<BufReader<File>>,
    index: PackIndex,
    version: u32,
    object_count: u32,
    path: PathBuf,
}

impl PackReader {
    /// Open a pack file and its `.idx` sidecar.
    ///
    /// Accepts pack versions 2 and 3 and requires the index object count
    /// to match the pack header's.
    pub fn open(pack_path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = pack_path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut stream = BufReader::new(file);

        let mut header = [0u8; PACK_HEADER_LEN as usize];
        stream
            .read_exact(&mut header)
            .map_err(|_| PackError::BadPackHeader("file too small".into()))?;
        if &header[0..4] != PACK_SIGNATURE {
            return Err(PackError::BadPackHeader("bad PACK signature".into()));
        }
        let version = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
        if version != 2 && version != 3 {
            return Err(PackError::UnsupportedVersion(version));
        }
        let object_count = u32::from_be_bytes([header[8], header[9], header[10], header[11]]);

        let index = PackIndex::open(path.with_extension("idx"))?;
        if index.object_count() != object_count {
            return Err(PackError::BadPackHeader(format!(
                "pack has {object_count} objects but index has {}",
                index.object_count()
            )));
        }

        Ok(Self {
            stream: Mutex::new(stream),
            index,
            version,
            object_count,
            path,
        })
    }

    /// The pack format version (2 or 3).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of object records in the pack.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Path of the `.pack` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The index sidecar.
    pub fn index(&self) -> &PackIndex {
        &self.index
    }

    /// Whether the pack contains the identifier.
    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.index.offset_of(oid).is_some()
    }

    /// Random access by identifier: fan-out bucket, binary search, then a
    /// header parse at the recorded offset. `None` for identifiers the
    /// pack does not hold.
    pub fn get(&self, oid: &ObjectId) -> Result<Option<PackEntry>, PackError> {
        match self.index.offset_of(oid) {
            Some(offset) => self.entry_at(offset).map(Some),
            None => Ok(None),
        }
    }

    /// Parse the record header at a known pack offset.
    pub fn entry_at(&self, offset: u64) -> Result<PackEntry, PackError> {
        let mut stream = self.lock();
        stream.seek(SeekFrom::Start(offset))?;
        read_header(&mut *stream, offset)
    }

    /// Inflate a record's data. For REF_DELTA records this is the delta
    /// itself; resolving it against [`PackEntry::base`] is the caller's
    /// job.
    pub fn inflate(&self, entry: &PackEntry) -> Result<Vec<u8>, PackError> {
        let mut stream = self.lock();
        stream.seek(SeekFrom::Start(entry.data_offset))?;

        let mut decoder = ZlibDecoder::new(&mut *stream);
        let mut data = Vec::with_capacity(entry.size as usize);
        decoder
            .read_to_end(&mut data)
            .map_err(|_| PackError::CorruptEntry(entry.offset))?;
        if data.len() as u64 != entry.size {
            return Err(PackError::CorruptEntry(entry.offset));
        }
        Ok(data)
    }

    /// Iterate over every record, in pack order.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            reader: self,
            next_offset: PACK_HEADER_LEN,
            remaining: self.object_count,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufReader<File>> {
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sequential iterator over pack records.
///
/// A record's compressed length is only known once its zlib stream ends,
/// so each step drains the stream through a small scratch buffer. The
/// decoder consumes exactly the compressed bytes from the buffered reader
/// (read-ahead stays in the buffer), which leaves the stream positioned at
/// the next record's header even when nobody inflated the body.
pub struct Entries<'a> {
    reader: &'a PackReader,
    next_offset: u64,
    remaining: u32,
}

impl Entries<'_> {
    fn step(&mut self) -> Result<PackEntry, PackError> {
        let mut stream = self.reader.lock();
        stream.seek(SeekFrom::Start(self.next_offset))?;
        let entry = read_header(&mut *stream, self.next_offset)?;

        let mut decoder = ZlibDecoder::new(&mut *stream);
        let mut scratch = [0u8; 1024];
        loop {
            let n = decoder
                .read(&mut scratch)
                .map_err(|_| PackError::CorruptEntry(entry.offset))?;
            if n == 0 {
                break;
            }
        }
        drop(decoder);

        self.next_offset = stream.stream_position()?;
        Ok(entry)
    }
}

impl Iterator for Entries<'_> {
    type Item = Result<PackEntry, PackError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.step())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining as usize, Some(self.remaining as usize))
    }
}

impl ExactSizeIterator for Entries<'_> {}
