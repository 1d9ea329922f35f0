//! Repository facade for the gitdb object database.
//!
//! A [`Repository`] is the narrow surface the tree, index, and pack layers
//! consume: loose object reads and writes under `<gitdir>/objects/`, blob
//! and tree writers, lazy tree mapping, and the configuration lookups the
//! working-tree code needs (`core.filemode`).

mod config;
mod loose;

pub use config::Config;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use bstr::BString;
use gitdb_hash::{HashError, ObjectId};
use gitdb_object::{EntryId, ObjectData, ObjectError, ObjectKind, ObjectSource, Tree};

/// Errors from repository operations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: ObjectId, reason: String },

    #[error(transparent)]
    Object(#[from] ObjectError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to a git directory and its loose object store.
#[derive(Clone)]
pub struct Repository {
    git_dir: PathBuf,
    objects_dir: PathBuf,
    config: Config,
}

impl Repository {
    /// Open a repository rooted at the given `.git` directory.
    pub fn open(git_dir: impl AsRef<Path>) -> Self {
        let git_dir = git_dir.as_ref().to_path_buf();
        let objects_dir = git_dir.join("objects");
        Self {
            git_dir,
            objects_dir,
            config: Config::new(),
        }
    }

    /// The `.git` directory this repository is rooted at.
    pub fn directory(&self) -> &Path {
        &self.git_dir
    }

    /// Where the staging-area index lives.
    pub fn index_path(&self) -> PathBuf {
        self.git_dir.join("index")
    }

    /// The repository configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The repository configuration, mutably.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Map an object identifier to a lazy [`Tree`] bound to this
    /// repository. The tree hydrates on first member access.
    pub fn map_tree(&self, oid: ObjectId) -> Tree {
        Tree::with_source(Rc::new(self.clone()), oid)
    }

    /// Serialize a tree node, store it, and record its identifier.
    pub fn write_tree(&self, tree: &mut Tree, dir: EntryId) -> Result<ObjectId, RepoError> {
        let content = tree.encode(dir)?;
        let oid = self.write_object(ObjectKind::Tree, &content)?;
        tree.set_id(dir, oid);
        Ok(oid)
    }

    /// The workdir-relative `/`-separated form of `file`.
    pub fn strip_work_dir(workdir: impl AsRef<Path>, file: impl AsRef<Path>) -> BString {
        gitdb_utils::path::strip_work_dir(workdir, file)
    }

    /// Normalize directory separators to `/`.
    pub fn internal_slash(path: impl AsRef<[u8]>) -> BString {
        gitdb_utils::path::internal_slash(path)
    }
}

impl ObjectSource for Repository {
    fn open_object(&self, oid: &ObjectId) -> Result<Option<ObjectData>, ObjectError> {
        Repository::open_object(self, oid).map_err(|e| match e {
            RepoError::Object(o) => o,
            RepoError::Hash(h) => ObjectError::Hash(h),
            RepoError::Io(io) => ObjectError::Io(io),
            RepoError::Corrupt { oid, reason } => {
                ObjectError::InvalidHeader(format!("{oid}: {reason}"))
            }
        })
    }
}
