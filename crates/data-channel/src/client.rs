//! TCP put client (sending side).
//!
//! Connects to a target's listener, authenticates with the token, and
//! writes the put frames of a single session.

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fileput_protocol::constants::{AUTH_TIMEOUT, CONNECT_TIMEOUT, RESPONSE_TIMEOUT};
use fileput_protocol::wire::{
    read_auth_response, read_response, write_close, write_contents, write_hash, write_open,
    write_token,
};
use fileput_protocol::{HashType, PutDetails, PutResponse};

use crate::TCP_BUFFER_SIZE;
use crate::error::DataChannelError;
use crate::token::is_well_formed;

/// An authenticated connection carrying one put session.
pub struct PutClient {
    addr: String,
    reader: OwnedReadHalf,
    writer: BufWriter<OwnedWriteHalf>,
    closed: bool,
}

impl PutClient {
    /// Connects to `addr` and performs the token handshake.
    pub async fn connect(
        addr: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Self, DataChannelError> {
        if !is_well_formed(token) {
            return Err(DataChannelError::InvalidToken(format!(
                "token for {addr} must be 32 hex characters"
            )));
        }

        // Connect with timeout + cancellation.
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr)) => {
                match result {
                    Ok(Ok(s)) => s,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(DataChannelError::Timeout),
                }
            }
        };
        stream.set_nodelay(true)?;

        let (mut reader, writer) = stream.into_split();
        let mut writer = BufWriter::with_capacity(TCP_BUFFER_SIZE, writer);

        write_token(&mut writer, token).await?;
        writer.flush().await?;

        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(DataChannelError::Cancelled);
            }
            result = tokio::time::timeout(AUTH_TIMEOUT, read_auth_response(&mut reader)) => {
                match result {
                    Ok(Ok(a)) => a,
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => return Err(DataChannelError::Timeout),
                }
            }
        };
        if !accepted {
            return Err(DataChannelError::AuthFailed(format!("{addr} rejected token")));
        }

        info!(%addr, "put channel authenticated");
        Ok(Self {
            addr: addr.to_string(),
            reader,
            writer,
            closed: false,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub async fn send_open(&mut self, details: &PutDetails) -> Result<(), DataChannelError> {
        self.ensure_open()?;
        write_open(&mut self.writer, details).await?;
        Ok(())
    }

    pub async fn send_contents(&mut self, data: &[u8]) -> Result<(), DataChannelError> {
        self.ensure_open()?;
        write_contents(&mut self.writer, data).await?;
        Ok(())
    }

    pub async fn send_hash(&mut self, hash: &HashType) -> Result<(), DataChannelError> {
        self.ensure_open()?;
        write_hash(&mut self.writer, hash).await?;
        Ok(())
    }

    /// Writes the end-of-stream frame and shuts down the write half.
    ///
    /// Calling it again is a no-op.
    pub async fn close_send(&mut self) -> Result<(), DataChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        write_close(&mut self.writer).await?;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        debug!(addr = %self.addr, "put channel send side closed");
        Ok(())
    }

    /// Waits for the terminal response.
    pub async fn recv_response(&mut self) -> Result<PutResponse, DataChannelError> {
        match tokio::time::timeout(RESPONSE_TIMEOUT, read_response(&mut self.reader)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DataChannelError::Timeout),
        }
    }

    fn ensure_open(&self) -> Result<(), DataChannelError> {
        if self.closed {
            return Err(DataChannelError::Protocol("send side already closed".into()));
        }
        Ok(())
    }
}
