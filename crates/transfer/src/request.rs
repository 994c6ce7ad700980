use std::path::PathBuf;

use fileput_protocol::HashMethod;
use fileput_protocol::constants::{DEFAULT_PERMISSIONS, DEFAULT_WRITE_SIZE_KB, MAX_PERMISSIONS};

use crate::TransferError;
use crate::chunked::chunk_size_for;

/// Immutable description of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Local file to send.
    pub local_path: PathBuf,
    /// Remote destination name. `None` or empty uses the local base name.
    pub remote_name: Option<String>,
    /// Remote permission bits. `0` uses the local file's mode.
    pub permissions: u32,
    /// Digest algorithm for end-to-end verification.
    pub hash_method: HashMethod,
    /// Chunk write size in decimal kilobytes. `0` uses the default.
    pub write_size_kb: u64,
}

impl TransferRequest {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
            remote_name: None,
            permissions: DEFAULT_PERMISSIONS,
            hash_method: HashMethod::default(),
            write_size_kb: DEFAULT_WRITE_SIZE_KB,
        }
    }

    pub fn with_remote_name(mut self, name: impl Into<String>) -> Self {
        self.remote_name = Some(name.into());
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_hash_method(mut self, method: HashMethod) -> Self {
        self.hash_method = method;
        self
    }

    pub fn with_write_size_kb(mut self, kb: u64) -> Self {
        self.write_size_kb = kb;
        self
    }

    /// Effective chunk size in bytes (`write_size_kb * 1000`).
    pub fn chunk_size(&self) -> Result<usize, TransferError> {
        chunk_size_for(self.write_size_kb)
    }

    /// Checks the request invariants that do not need the filesystem.
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.local_path.as_os_str().is_empty() {
            return Err(TransferError::InvalidPath("missing local file".into()));
        }
        if self.permissions > MAX_PERMISSIONS {
            return Err(TransferError::InvalidPermissions(self.permissions));
        }
        self.chunk_size()?;
        Ok(())
    }
}
