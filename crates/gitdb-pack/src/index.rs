//! The legacy pack index sidecar.
//!
//! Layout: a 256-entry fan-out table of cumulative counts, then one
//! 24-byte record per object (a 4-byte pack offset followed by the
//! 20-byte identifier, sorted by identifier), then the pack checksum and
//! the index's own checksum. There is no header; the newer index format
//! announces itself with a `\377tOc` magic and is rejected.

use std::path::{Path, PathBuf};

use gitdb_hash::fanout::FanoutTable;
use gitdb_hash::ObjectId;
use memmap2::Mmap;

use crate::PackError;

const FANOUT_LEN: usize = 1024;
const RECORD_LEN: usize = 24;
const TRAILER_LEN: usize = 40;

/// Magic of the unsupported version-2 index format.
const V2_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];

/// Memory-mapped legacy pack index providing identifier → offset lookup.
pub struct PackIndex {
    data: Mmap,
    fanout: FanoutTable,
    object_count: u32,
    path: PathBuf,
}

impl PackIndex {
    /// Open and validate a pack index file.
    ///
    /// The file size must be exactly `1024 + 24·N + 40` for the object
    /// count N recorded in the fan-out table.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PackError> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let data = unsafe { Mmap::map(&file)? };

        if data.len() >= 4 && data[0..4] == V2_MAGIC {
            return Err(PackError::BadIndex("version 2 pack index".into()));
        }
        if data.len() < FANOUT_LEN + TRAILER_LEN {
            return Err(PackError::BadIndex(format!(
                "file too small: {} bytes",
                data.len()
            )));
        }

        let fanout = FanoutTable::from_bytes(&data[..FANOUT_LEN])
            .map_err(|e| PackError::BadIndex(e.to_string()))?;
        let object_count = fanout.total();

        let expected = FANOUT_LEN + RECORD_LEN * object_count as usize + TRAILER_LEN;
        if data.len() != expected {
            return Err(PackError::BadIndex(format!(
                "size mismatch: {} bytes, expected {expected} for {object_count} objects",
                data.len()
            )));
        }

        Ok(Self {
            data,
            fanout,
            object_count,
            path,
        })
    }

    /// Number of objects in the pack this index describes.
    pub fn object_count(&self) -> u32 {
        self.object_count
    }

    /// Path of the `.idx` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the pack offset of an identifier, if the pack contains it.
    ///
    /// The fan-out table narrows the search to one first-byte bucket; a
    /// binary search over the sorted records finishes the job.
    pub fn offset_of(&self, oid: &ObjectId) -> Option<u64> {
        let range = self.fanout.range(oid.first_byte());
        let target = oid.as_bytes();

        let mut lo = range.start;
        let mut hi = range.end;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.id_bytes_at(mid).cmp(target) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Some(self.offset_at(mid)),
            }
        }
        None
    }

    /// The record at a sorted position: identifier and pack offset.
    pub fn entry_at(&self, position: usize) -> (ObjectId, u64) {
        let id = ObjectId::from_bytes(self.id_bytes_at(position))
            .expect("record slice is 20 bytes");
        (id, self.offset_at(position))
    }

    /// Iterate all records in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (ObjectId, u64)> + '_ {
        (0..self.object_count as usize).map(|i| self.entry_at(i))
    }

    /// The pack checksum recorded in the trailer.
    pub fn pack_checksum(&self) -> ObjectId {
        let start = self.data.len() - TRAILER_LEN;
        ObjectId::from_bytes(&self.data[start..start + 20]).expect("trailer slice is 20 bytes")
    }

    /// The index file's own trailing checksum.
    pub fn index_checksum(&self) -> ObjectId {
        let start = self.data.len() - 20;
        ObjectId::from_bytes(&self.data[start..]).expect("trailer slice is 20 bytes")
    }

    fn record_start(&self, position: usize) -> usize {
        FANOUT_LEN + position * RECORD_LEN
    }

    fn offset_at(&self, position: usize) -> u64 {
        let at = self.record_start(position);
        u64::from(u32::from_be_bytes([
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ]))
    }

    fn id_bytes_at(&self, position: usize) -> &[u8] {
        let at = self.record_start(position) + 4;
        &self.data[at..at + 20]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_oid(first: u8, last: u8) -> ObjectId {
        let mut raw = [0u8; 20];
        raw[0] = first;
        raw[19] = last;
        ObjectId::from_raw(raw)
    }

    /// Build a legacy index from (oid, offset) pairs.
    fn build_index(entries: &[(ObjectId, u32)]) -> Vec<u8> {
        let mut sorted: Vec<_> = entries.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut buf = Vec::new();
        let mut fanout = [0u32; 256];
        for (oid, _) in &sorted {
            fanout[oid.first_byte() as usize] += 1;
        }
        for i in 1..256 {
            fanout[i] += fanout[i - 1];
        }
        for count in fanout {
            buf.extend_from_slice(&count.to_be_bytes());
        }
        for (oid, offset) in &sorted {
            buf.extend_from_slice(&offset.to_be_bytes());
            buf.extend_from_slice(oid.as_bytes());
        }
        // Pack checksum + index checksum trailer.
        buf.extend_from_slice(&[0xaa; 20]);
        buf.extend_from_slice(&[0xbb; 20]);
        buf
    }

    fn write_index(dir: &Path, data: &[u8]) -> PathBuf {
        let path = dir.join("test.idx");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn lookup_single_object() {
        let dir = tempfile::tempdir().unwrap();
        let oid = make_oid(0xab, 0x01);
        let path = write_index(dir.path(), &build_index(&[(oid, 12)]));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.object_count(), 1);
        assert_eq!(idx.offset_of(&oid), Some(12));
        assert_eq!(idx.offset_of(&make_oid(0xab, 0x02)), None);
        assert_eq!(idx.offset_of(&make_oid(0x00, 0x00)), None);
    }

    #[test]
    fn lookup_across_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0x00, 0x01), 100u32),
            (make_oid(0x00, 0x02), 200),
            (make_oid(0x0a, 0x01), 300),
            (make_oid(0xff, 0x01), 400),
        ];
        let path = write_index(dir.path(), &build_index(&entries));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.object_count(), 4);
        for (oid, offset) in &entries {
            assert_eq!(idx.offset_of(oid), Some(u64::from(*offset)));
        }
    }

    #[test]
    fn records_are_sorted_by_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let entries = vec![
            (make_oid(0xff, 0x01), 100u32),
            (make_oid(0x00, 0x01), 200),
            (make_oid(0x55, 0x01), 300),
        ];
        let path = write_index(dir.path(), &build_index(&entries));

        let idx = PackIndex::open(&path).unwrap();
        let ids: Vec<ObjectId> = idx.iter().map(|(oid, _)| oid).collect();
        assert_eq!(
            ids,
            vec![
                make_oid(0x00, 0x01),
                make_oid(0x55, 0x01),
                make_oid(0xff, 0x01)
            ]
        );
    }

    #[test]
    fn trailer_checksums_are_exposed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &build_index(&[]));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.pack_checksum(), ObjectId::from_raw([0xaa; 20]));
        assert_eq!(idx.index_checksum(), ObjectId::from_raw([0xbb; 20]));
    }

    #[test]
    fn size_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = build_index(&[(make_oid(0x10, 0x01), 12)]);
        data.push(0); // one stray byte
        let path = write_index(dir.path(), &data);

        assert!(matches!(
            PackIndex::open(&path),
            Err(PackError::BadIndex(_))
        ));
    }

    #[test]
    fn v2_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = vec![0xff, b't', b'O', b'c'];
        data.extend_from_slice(&[0u8; 2000]);
        let path = write_index(dir.path(), &data);

        match PackIndex::open(&path) {
            Err(PackError::BadIndex(reason)) => assert!(reason.contains("version 2")),
            other => panic!("expected BadIndex, got {:?}", other.map(|i| i.object_count())),
        }
    }

    #[test]
    fn empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_index(dir.path(), &build_index(&[]));

        let idx = PackIndex::open(&path).unwrap();
        assert_eq!(idx.object_count(), 0);
        assert_eq!(idx.iter().count(), 0);
    }
}
