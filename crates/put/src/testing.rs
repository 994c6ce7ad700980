//! Recording mock target and channel shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use fileput_protocol::{HashType, PutDetails, PutResponse};
use tokio_util::sync::CancellationToken;

use crate::channel::{BoxFuture, PutChannel, TargetConnection};
use crate::error::{Phase, PutError};

/// A message observed by the mock channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Open(PutDetails),
    Contents(Vec<u8>),
    Hash(HashType),
    CloseSend,
}

/// Failure injection for the mock.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_connect: bool,
    pub fail_open: bool,
    /// Zero-based index of the contents message that fails.
    pub fail_contents_at: Option<usize>,
    pub fail_hash: bool,
    /// Contents sends never complete.
    pub hang_contents: bool,
    /// The terminal response never arrives.
    pub hang_recv: bool,
    /// Terminal response is a rejection with this message.
    pub reject: Option<String>,
}

pub struct MockTarget {
    id: String,
    behavior: Behavior,
    log: Arc<Mutex<Vec<Sent>>>,
    connects: AtomicUsize,
    close_calls: Arc<AtomicUsize>,
}

impl MockTarget {
    pub fn new(id: &str) -> Self {
        Self::with(id, Behavior::default())
    }

    pub fn with(id: &str, behavior: Behavior) -> Self {
        Self {
            id: id.into(),
            behavior,
            log: Arc::new(Mutex::new(Vec::new())),
            connects: AtomicUsize::new(0),
            close_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Successfully recorded messages, in order.
    pub fn sent(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Every `close_send` call, including the ignored repeats.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

impl TargetConnection for MockTarget {
    fn target_id(&self) -> &str {
        &self.id
    }

    fn open_channel(
        &self,
        _cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<Box<dyn PutChannel>, PutError>> {
        Box::pin(async move {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.behavior.fail_connect {
                return Err(PutError::Connect(format!("{}: connection refused", self.id)));
            }
            let channel: Box<dyn PutChannel> = Box::new(MockChannel {
                behavior: self.behavior.clone(),
                log: self.log.clone(),
                close_calls: self.close_calls.clone(),
                contents_sent: 0,
                closed: false,
            });
            Ok(channel)
        })
    }
}

struct MockChannel {
    behavior: Behavior,
    log: Arc<Mutex<Vec<Sent>>>,
    close_calls: Arc<AtomicUsize>,
    contents_sent: usize,
    closed: bool,
}

impl MockChannel {
    fn record(&self, sent: Sent) {
        self.log.lock().unwrap().push(sent);
    }
}

impl PutChannel for MockChannel {
    fn send_open<'a>(&'a mut self, details: &'a PutDetails) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            if self.behavior.fail_open {
                return Err(PutError::transport(Phase::Open, "stream reset"));
            }
            self.record(Sent::Open(details.clone()));
            Ok(())
        })
    }

    fn send_contents<'a>(&'a mut self, data: &'a [u8]) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            if self.behavior.hang_contents {
                std::future::pending::<()>().await;
            }
            if self.behavior.fail_contents_at == Some(self.contents_sent) {
                return Err(PutError::transport(Phase::Contents, "broken pipe"));
            }
            self.contents_sent += 1;
            self.record(Sent::Contents(data.to_vec()));
            Ok(())
        })
    }

    fn send_hash<'a>(&'a mut self, hash: &'a HashType) -> BoxFuture<'a, Result<(), PutError>> {
        Box::pin(async move {
            if self.behavior.fail_hash {
                return Err(PutError::transport(Phase::Hash, "broken pipe"));
            }
            self.record(Sent::Hash(hash.clone()));
            Ok(())
        })
    }

    fn close_send(&mut self) -> BoxFuture<'_, Result<(), PutError>> {
        Box::pin(async move {
            self.close_calls.fetch_add(1, Ordering::SeqCst);
            if !self.closed {
                self.closed = true;
                self.record(Sent::CloseSend);
            }
            Ok(())
        })
    }

    fn recv_response(&mut self) -> BoxFuture<'_, Result<PutResponse, PutError>> {
        Box::pin(async move {
            if self.behavior.hang_recv {
                std::future::pending::<()>().await;
            }
            match &self.behavior.reject {
                Some(msg) => Ok(PutResponse::rejected(msg.clone())),
                None => Ok(PutResponse::ok("")),
            }
        })
    }
}
