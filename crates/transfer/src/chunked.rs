use std::io::ErrorKind;
use std::path::Path;

use fileput_protocol::constants::{BYTES_PER_KB, DEFAULT_WRITE_SIZE_KB, MAX_FRAME_LEN};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads a byte source sequentially in fixed-size chunks.
///
/// Every chunk except the last is exactly `chunk_size` bytes; short reads
/// from the underlying source are retried until the chunk is full or the
/// source reports end-of-data.
pub struct ChunkReader<R> {
    reader: R,
    chunk_size: usize,
    offset: u64,
    chunks: u64,
    eof: bool,
}

impl ChunkReader<tokio::fs::File> {
    /// Opens `path` for chunked reading with its own file handle.
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        Self::new(file, chunk_size)
    }
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wraps `reader` with a chunk size in bytes.
    ///
    /// Zero and sizes above one wire frame are rejected.
    pub fn new(reader: R, chunk_size: usize) -> Result<Self, TransferError> {
        if chunk_size == 0 || chunk_size > MAX_FRAME_LEN {
            return Err(TransferError::InvalidChunkSize);
        }
        Ok(Self {
            reader,
            chunk_size,
            offset: 0,
            chunks: 0,
            eof: false,
        })
    }

    /// Wraps `reader` with a write size in decimal kilobytes.
    ///
    /// A write size of 0 selects [`DEFAULT_WRITE_SIZE_KB`].
    pub fn with_write_size(reader: R, write_size_kb: u64) -> Result<Self, TransferError> {
        Self::new(reader, chunk_size_for(write_size_kb)?)
    }

    /// Reads the next chunk. Returns `None` at end-of-data.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, TransferError> {
        if self.eof {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]).await {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);

        let chunk = Chunk {
            offset: self.offset,
            data: buf,
        };
        self.offset += filled as u64;
        self.chunks += 1;
        Ok(Some(chunk))
    }

    /// Bytes produced so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Chunks produced so far.
    pub fn chunks_read(&self) -> u64 {
        self.chunks
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Converts a write size in decimal kilobytes to a chunk size in bytes.
///
/// Each chunk travels as one contents frame, so it may not exceed
/// [`MAX_FRAME_LEN`].
pub(crate) fn chunk_size_for(write_size_kb: u64) -> Result<usize, TransferError> {
    let kb = if write_size_kb == 0 {
        DEFAULT_WRITE_SIZE_KB
    } else {
        write_size_kb
    };
    kb.checked_mul(BYTES_PER_KB)
        .and_then(|bytes| usize::try_from(bytes).ok())
        .filter(|&bytes| bytes <= MAX_FRAME_LEN)
        .ok_or(TransferError::InvalidChunkSize)
}
