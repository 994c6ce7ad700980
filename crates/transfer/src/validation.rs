use std::path::{Component, Path};

use crate::TransferError;

/// Longest remote name a receiver accepts, in bytes.
const MAX_REMOTE_NAME_LEN: usize = 4096;

/// Validates a remote file name before it is joined onto a receiver's root.
///
/// Rejects:
/// - Empty names, names with NUL bytes, and names over 4 KiB
/// - Names that end in a separator (those name directories)
/// - Absolute paths and Windows prefixes (`C:`, `\\server`)
/// - Parent directory traversal (`..`)
pub fn validate_remote_path(remote: &str) -> Result<(), TransferError> {
    if remote.is_empty() {
        return Err(TransferError::InvalidPath("empty remote name".into()));
    }
    if remote.len() > MAX_REMOTE_NAME_LEN {
        return Err(TransferError::InvalidPath(format!(
            "remote name too long: {} bytes",
            remote.len()
        )));
    }
    if remote.contains('\0') {
        return Err(TransferError::InvalidPath("NUL byte in remote name".into()));
    }
    if remote.ends_with('/') || remote.ends_with('\\') {
        return Err(TransferError::InvalidPath(format!(
            "remote name is a directory: {remote}"
        )));
    }
    if remote.starts_with("\\\\") || (remote.len() >= 2 && remote.as_bytes()[1] == b':') {
        return Err(TransferError::InvalidPath(format!(
            "path prefix not allowed: {remote}"
        )));
    }

    let path = Path::new(remote);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {remote}"
        )));
    }

    let mut has_name = false;
    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {remote}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {remote}"
                )));
            }
            Component::Normal(_) => has_name = true,
            Component::CurDir => {}
        }
    }
    if !has_name {
        return Err(TransferError::InvalidPath(format!(
            "remote name has no file component: {remote}"
        )));
    }

    Ok(())
}
