//! Adapter bridging the TCP data channel to the `fileput-put` traits.

use fileput_data_channel::{DataChannelError, PutClient};
use fileput_protocol::{HashType, PutDetails, PutResponse};
use fileput_put::{BoxFuture, Phase, PutChannel, PutError, TargetConnection};
use tokio_util::sync::CancellationToken;

use crate::config::TargetConfig;

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// Implements `TargetConnection` by dialing the target's put server.
pub struct TcpTarget {
    id: String,
    address: String,
    token: String,
}

impl TcpTarget {
    pub fn new(id: impl Into<String>, address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            token: token.into(),
        }
    }
}

impl From<&TargetConfig> for TcpTarget {
    fn from(cfg: &TargetConfig) -> Self {
        Self::new(cfg.id(), &cfg.address, &cfg.token)
    }
}

impl TargetConnection for TcpTarget {
    fn target_id(&self) -> &str {
        &self.id
    }

    fn open_channel(
        &self,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Box<dyn PutChannel>, PutError>> {
        Box::pin(async move {
            let client = PutClient::connect(&self.address, &self.token, &cancel)
                .await
                .map_err(|e| match e {
                    DataChannelError::Cancelled => PutError::Cancelled,
                    other => PutError::Connect(format!("{}: {other}", self.address)),
                })?;
            let channel: Box<dyn PutChannel> = Box::new(TcpChannel { client });
            Ok(channel)
        })
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

struct TcpChannel {
    client: PutClient,
}

fn in_phase(phase: Phase) -> impl FnOnce(DataChannelError) -> PutError {
    move |e| PutError::transport(phase, e)
}

impl PutChannel for TcpChannel {
    fn send_open<'a>(&'a mut self, details: &'a PutDetails) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            self.client
                .send_open(details)
                .await
                .map_err(in_phase(Phase::Open))
        })
    }

    fn send_contents<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            self.client
                .send_contents(data)
                .await
                .map_err(in_phase(Phase::Contents))
        })
    }

    fn send_hash<'a>(&'a mut self, hash: &'a HashType) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            self.client
                .send_hash(hash)
                .await
                .map_err(in_phase(Phase::Hash))
        })
    }

    fn close_send(&mut self) -> BoxFuture<'_, Result<(), PutError>> {
        Box::pin(async move { self.client.close_send().await.map_err(in_phase(Phase::Close)) })
    }

    fn recv_response(&mut self) -> BoxFuture<'_, Result<PutResponse, PutError>> {
        Box::pin(async move {
            self.client
                .recv_response()
                .await
                .map_err(in_phase(Phase::Close))
        })
    }
}
