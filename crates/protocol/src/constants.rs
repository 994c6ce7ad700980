use std::time::Duration;

/// Default chunk write size in kilobytes.
pub const DEFAULT_WRITE_SIZE_KB: u64 = 64;

/// Bytes per configured kilobyte. Write sizes are decimal kilobytes.
pub const BYTES_PER_KB: u64 = 1000;

/// Default permission bits requested for the remote file.
pub const DEFAULT_PERMISSIONS: u32 = 0o777;

/// Largest permission value the open message may carry.
pub const MAX_PERMISSIONS: u32 = 0o7777;

/// Maximum payload length of a single frame (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Authentication token length in bytes (32 hex characters).
pub const TOKEN_LEN: usize = 32;

/// Timeout for establishing the TCP connection to a target.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for the token handshake.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for the remote's final response after end-of-stream.
///
/// The remote flushes and verifies the whole file before answering,
/// so this is generous.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);
