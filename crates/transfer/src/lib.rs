//! Local side of a put session: chunked reads, streaming digests and
//! request defaults.

mod chunked;
mod digest;
mod permissions;
mod request;
mod types;
mod validation;

pub use chunked::ChunkReader;
pub use digest::{DigestAccumulator, digest_bytes};
pub use permissions::{local_mode, octal_round_trip, resolve_permissions, resolve_remote_name};
pub use request::TransferRequest;
pub use types::Chunk;
pub use validation::validate_remote_path;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(
        "chunk size must be between 1 and {} bytes",
        fileput_protocol::constants::MAX_FRAME_LEN
    )]
    InvalidChunkSize,

    #[error("permission bits {0:#o} exceed the protocol maximum")]
    InvalidPermissions(u32),

    #[error("permission parse failed for {value:?}: {source}")]
    PermissionParse {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
}
