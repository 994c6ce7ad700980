//! Target and channel traits.
//!
//! The application implements these on top of its transport. Using
//! traits keeps session logic decoupled from the wire and testable with
//! mocks.

use std::future::Future;
use std::pin::Pin;

use fileput_protocol::{HashType, PutDetails, PutResponse};
use tokio_util::sync::CancellationToken;

use crate::error::PutError;

/// Boxed, sendable future returned by the trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One open put stream to one target.
///
/// Messages must be sent in order: `send_open`, any number of
/// `send_contents`, `send_hash`, then `close_send` and `recv_response`.
pub trait PutChannel: Send {
    /// Sends the open-details message.
    fn send_open<'a>(&'a mut self, details: &'a PutDetails) -> BoxFuture<'a, Result<(), PutError>>;

    /// Sends one contents chunk.
    fn send_contents<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<(), PutError>>;

    /// Sends the finalized digest.
    fn send_hash<'a>(&'a mut self, hash: &'a HashType) -> BoxFuture<'a, Result<(), PutError>>;

    /// Signals end-of-stream on the send side.
    ///
    /// Must be idempotent: the driver calls it again on abort paths.
    fn close_send(&mut self) -> BoxFuture<'_, Result<(), PutError>>;

    /// Waits for the remote's terminal response.
    fn recv_response(&mut self) -> BoxFuture<'_, Result<PutResponse, PutError>>;

    /// Closes the send side, then waits for the terminal response.
    fn close_and_recv(&mut self) -> BoxFuture<'_, Result<PutResponse, PutError>> {
        Box::pin(async move {
            self.close_send().await?;
            self.recv_response().await
        })
    }
}

/// A remote endpoint that can open put channels.
pub trait TargetConnection: Send + Sync {
    /// Unique identifier of the target (usually its address).
    fn target_id(&self) -> &str;

    /// Establishes a new put channel.
    ///
    /// Implementations should abandon the attempt once `cancel` fires.
    fn open_channel(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Box<dyn PutChannel>, PutError>>;
}
