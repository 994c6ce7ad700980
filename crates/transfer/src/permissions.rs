//! Remote name and permission defaulting.

use std::fs::Metadata;
use std::path::Path;

use crate::TransferError;

/// Re-encodes permission bits through their octal string form.
///
/// The bits are masked to `0o777`, rendered as `"0"` followed by the
/// octal digits, and parsed back as base 8.
pub fn octal_round_trip(mode: u32) -> Result<u32, TransferError> {
    let perm = format!("0{:o}", mode & 0o777);
    let parsed = i64::from_str_radix(&perm, 8).map_err(|source| {
        TransferError::PermissionParse {
            value: perm.clone(),
            source,
        }
    })?;
    u32::try_from(parsed).map_err(|_| TransferError::InvalidPermissions(mode))
}

/// Resolves the permission bits sent in the open message.
///
/// A non-zero `configured` value wins; zero means "use the local file's
/// own mode" after an [`octal_round_trip`].
pub fn resolve_permissions(configured: u32, local_mode: u32) -> Result<u32, TransferError> {
    if configured != 0 {
        return Ok(configured);
    }
    octal_round_trip(local_mode)
}

/// Resolves the remote file name.
///
/// A non-empty `configured` name wins; otherwise the local file's base
/// name is used.
pub fn resolve_remote_name(
    configured: Option<&str>,
    local_path: &Path,
) -> Result<String, TransferError> {
    if let Some(name) = configured.filter(|n| !n.is_empty()) {
        return Ok(name.to_string());
    }
    local_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            TransferError::InvalidPath(format!(
                "cannot derive a remote name from {}",
                local_path.display()
            ))
        })
}

/// Permission bits of a local file.
#[cfg(unix)]
pub fn local_mode(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Permission bits of a local file.
///
/// Non-Unix platforms only expose a read-only flag.
#[cfg(not(unix))]
pub fn local_mode(metadata: &Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o666
    }
}
