//! Put error types.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use fileput_transfer::TransferError;

/// Protocol phase a transport error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Contents,
    Hash,
    Close,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Open => "open",
            Phase::Contents => "contents",
            Phase::Hash => "hash",
            Phase::Close => "close",
        })
    }
}

/// Errors produced during a put.
///
/// `Clone` so that a plan failure can be reported once per target.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PutError {
    #[error("local source {}: {source}", path.display())]
    LocalSource {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("directories unsupported: {}", .0.display())]
    DirectoryUnsupported(PathBuf),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("permission parse failed: {0}")]
    PermissionParse(String),

    #[error("session establishment failed: {0}")]
    Connect(String),

    #[error("{phase} failed: {message}")]
    Transport { phase: Phase, message: String },

    #[error("local read failed at byte {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("remote rejected the file: {0}")]
    Remote(String),

    #[error("cancelled")]
    Cancelled,

    #[error("session task failed: {0}")]
    Task(String),

    #[error("there were {failed} errors out of {total} targets")]
    Aggregate { failed: usize, total: usize },
}

impl PutError {
    pub fn local(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        PutError::LocalSource {
            path: path.into(),
            source: Arc::new(err),
        }
    }

    pub fn transport(phase: Phase, err: impl fmt::Display) -> Self {
        PutError::Transport {
            phase,
            message: err.to_string(),
        }
    }

    /// Maps a transfer-crate error raised while reading `path`.
    pub fn from_transfer(path: impl Into<PathBuf>, err: TransferError) -> Self {
        match err {
            TransferError::Io(e) => PutError::local(path, e),
            TransferError::PermissionParse { .. } => PutError::PermissionParse(err.to_string()),
            TransferError::InvalidPath(_)
            | TransferError::InvalidChunkSize
            | TransferError::InvalidPermissions(_) => PutError::InvalidRequest(err.to_string()),
        }
    }

    /// Human label for the error category, used when reporting.
    pub fn category(&self) -> &'static str {
        match self {
            PutError::LocalSource { .. }
            | PutError::DirectoryUnsupported(_)
            | PutError::InvalidRequest(_)
            | PutError::PermissionParse(_) => "local precondition failed",
            PutError::Connect(_) => "session establishment failed",
            PutError::Transport { .. } | PutError::Read { .. } => "transfer aborted",
            PutError::Remote(_) => "remote rejected file",
            PutError::Cancelled => "put cancelled",
            PutError::Task(_) => "session task failed",
            PutError::Aggregate { .. } => "put failed",
        }
    }

    /// Returns `true` for errors raised before any remote interaction.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            PutError::LocalSource { .. }
                | PutError::DirectoryUnsupported(_)
                | PutError::InvalidRequest(_)
                | PutError::PermissionParse(_)
        )
    }
}
