use std::path::PathBuf;

/// Errors from the utility layer.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    #[error("file is locked: {path}")]
    AlreadyLocked { path: PathBuf },

    #[error("cannot create lock file {path}")]
    LockCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
