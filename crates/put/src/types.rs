//! Data types for the put flow.

use std::fmt;
use std::path::PathBuf;

use fileput_protocol::{HashMethod, PutDetails};
use fileput_transfer::{TransferRequest, local_mode, resolve_permissions, resolve_remote_name};
use tracing::info;

use crate::error::PutError;

/// A request with its defaults resolved.
///
/// Built once per invocation and shared read-only by every session, so
/// no running session ever writes back into shared configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutPlan {
    pub local_path: PathBuf,
    pub remote_file: String,
    pub permissions: u32,
    pub hash_method: HashMethod,
    /// Chunk size in bytes.
    pub chunk_size: usize,
}

impl PutPlan {
    /// Resolves `request` against the local file.
    ///
    /// Fails on a missing or unreadable source and on directories, before
    /// any remote interaction.
    pub async fn resolve(request: &TransferRequest) -> Result<Self, PutError> {
        let path = &request.local_path;
        request
            .validate()
            .map_err(|e| PutError::from_transfer(path, e))?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PutError::local(path, e))?;
        if metadata.is_dir() {
            return Err(PutError::DirectoryUnsupported(path.clone()));
        }

        let remote_file = resolve_remote_name(request.remote_name.as_deref(), path)
            .map_err(|e| PutError::from_transfer(path, e))?;

        let permissions = resolve_permissions(request.permissions, local_mode(&metadata))
            .map_err(|e| PutError::from_transfer(path, e))?;
        if request.permissions == 0 {
            info!("setting permission to 0{permissions:o}");
        }

        let chunk_size = request
            .chunk_size()
            .map_err(|e| PutError::from_transfer(path, e))?;

        Ok(Self {
            local_path: path.clone(),
            remote_file,
            permissions,
            hash_method: request.hash_method,
            chunk_size,
        })
    }

    /// Open-details message for this plan.
    pub fn details(&self) -> PutDetails {
        PutDetails {
            remote_file: self.remote_file.clone(),
            permissions: self.permissions,
        }
    }
}

/// State of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Opening,
    Sending,
    DigestPending,
    Closing,
    Done,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SessionState::Created => "created",
            SessionState::Opening => "opening",
            SessionState::Sending => "sending",
            SessionState::DigestPending => "digest-pending",
            SessionState::Closing => "closing",
            SessionState::Done => "done",
        })
    }
}

/// Outcome of one target's session.
#[derive(Debug, Clone)]
pub struct TransferResult {
    pub target_id: String,
    /// Remote file name used (empty when no plan could be built).
    pub remote_file: String,
    pub error: Option<PutError>,
}

impl TransferResult {
    pub fn ok(target_id: impl Into<String>, remote_file: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            remote_file: remote_file.into(),
            error: None,
        }
    }

    pub fn failed(
        target_id: impl Into<String>,
        remote_file: impl Into<String>,
        error: PutError,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            remote_file: remote_file.into(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
