//! Wire codec error types.

/// Errors produced while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown frame tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("unknown hash method code: {0}")]
    UnknownHashMethod(u8),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("malformed frame: {0}")]
    Malformed(String),
}

impl WireError {
    /// Returns `true` if the peer closed the stream mid-frame.
    pub fn is_eof(&self) -> bool {
        matches!(self, WireError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
