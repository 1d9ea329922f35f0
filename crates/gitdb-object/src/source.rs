use gitdb_hash::ObjectId;

use crate::{ObjectError, ObjectKind};

/// A loaded object: its kind tag and raw content bytes (header stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectData {
    kind: ObjectKind,
    data: Vec<u8>,
}

impl ObjectData {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// The object's kind tag.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// The content size in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// The content bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consume the loader, keeping only the content bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Read access to an object store, as consumed by lazy trees.
///
/// Implemented by the repository facade; test code substitutes in-memory
/// stores.
pub trait ObjectSource {
    /// Open an object by identifier. `None` when the store has no such
    /// object.
    fn open_object(&self, oid: &ObjectId) -> Result<Option<ObjectData>, ObjectError>;
}
