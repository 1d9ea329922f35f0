//! Tree object model and codec for the gitdb object database.
//!
//! Provides the [`FileMode`] enumeration, the object kind tags and loose
//! header codec, the [`ObjectSource`] contract repositories implement, and
//! the [`Tree`] type: an arena of directory entries kept in git tree order,
//! with a byte-exact codec and lazy hydration of nested trees.

pub mod header;
mod mode;
mod source;
mod tree;
mod visit;

pub use mode::FileMode;
pub use source::{ObjectData, ObjectSource};
pub use tree::{compare_names, EntryId, Tree};
pub use visit::{TraverseFlags, TreeVisitor};

use bstr::BString;
use gitdb_hash::{HashError, ObjectId};

/// Errors produced by object model operations.
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("invalid object kind: {0}")]
    InvalidKind(BString),

    #[error("invalid object header: {0}")]
    InvalidHeader(String),

    #[error("invalid file mode: {0}")]
    InvalidMode(BString),

    #[error("corrupt tree at offset {offset}: {reason}")]
    CorruptTree { offset: usize, reason: String },

    #[error("invalid entry name: {0:?}")]
    InvalidName(BString),

    #[error("entry already exists: {0}")]
    EntryExists(BString),

    #[error("missing object {0}")]
    MissingObject(ObjectId),

    #[error("object {oid} is a {actual}, expected {expected}")]
    IncorrectKind {
        oid: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    #[error("entry {0} has no identifier yet")]
    UnresolvedEntry(BString),

    #[error("tree {0} has pending changes and cannot be unloaded")]
    UnloadDirty(BString),

    #[error("tree {0} is not attached to an object source")]
    NoSource(ObjectId),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The four kinds of git objects, as tagged in object headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
    Tag,
}

impl ObjectKind {
    /// Parse from the ASCII tag in object headers.
    pub fn from_bytes(s: &[u8]) -> Result<Self, ObjectError> {
        match s {
            b"blob" => Ok(Self::Blob),
            b"tree" => Ok(Self::Tree),
            b"commit" => Ok(Self::Commit),
            b"tag" => Ok(Self::Tag),
            _ => Err(ObjectError::InvalidKind(BString::from(s))),
        }
    }

    /// The canonical ASCII tag.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Blob => b"blob",
            Self::Tree => b"tree",
            Self::Commit => b"commit",
            Self::Tag => b"tag",
        }
    }

    /// The canonical tag as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blob => "blob",
            Self::Tree => "tree",
            Self::Commit => "commit",
            Self::Tag => "tag",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ObjectError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}
