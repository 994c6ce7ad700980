//! Per-target put session.
//!
//! Drives one channel through `open -> contents* -> hash -> close` and
//! turns the outcome into exactly one [`TransferResult`].

use std::future::Future;
use std::time::Duration;

use fileput_protocol::PutRequest;
use fileput_transfer::{ChunkReader, DigestAccumulator, TransferError};
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use uuid::Uuid;

use crate::channel::{PutChannel, TargetConnection};
use crate::error::PutError;
use crate::types::{PutPlan, SessionState, TransferResult};

/// Upper bound on the best-effort send-side close after an abort.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives a put session to a single target.
pub struct SessionDriver<'a> {
    target: &'a dyn TargetConnection,
    plan: &'a PutPlan,
    cancel: CancellationToken,
    session_id: Uuid,
    state: SessionState,
}

impl<'a> SessionDriver<'a> {
    pub fn new(target: &'a dyn TargetConnection, plan: &'a PutPlan, cancel: CancellationToken) -> Self {
        Self {
            target,
            plan,
            cancel,
            session_id: Uuid::new_v4(),
            state: SessionState::Created,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Runs the session to completion. Never fails: errors are captured
    /// in the returned result.
    pub async fn run(mut self) -> TransferResult {
        let target_id = self.target.target_id().to_string();
        let outcome = self.drive().await;
        self.transition(SessionState::Done);

        match outcome {
            Ok(()) => TransferResult::ok(target_id, self.plan.remote_file.clone()),
            Err(e) => {
                debug!(
                    target_id = %target_id,
                    session = %self.session_id,
                    error = %e,
                    "session failed"
                );
                TransferResult::failed(target_id, self.plan.remote_file.clone(), e)
            }
        }
    }

    async fn drive(&mut self) -> Result<(), PutError> {
        self.check_cancelled()?;

        // Each session reads through its own handle.
        let plan = self.plan;
        let mut reader = ChunkReader::open(&plan.local_path, plan.chunk_size)
            .await
            .map_err(|e| PutError::from_transfer(&plan.local_path, e))?;

        let mut channel = self
            .until_cancelled(self.target.open_channel(self.cancel.clone()))
            .await?;

        if let Err(e) = self.stream(channel.as_mut(), &mut reader).await {
            self.release(channel.as_mut()).await;
            return Err(e);
        }

        self.transition(SessionState::Closing);
        let response = match self.until_cancelled(channel.close_and_recv()).await {
            Ok(response) => response,
            Err(e) => {
                self.release(channel.as_mut()).await;
                return Err(e);
            }
        };

        if !response.accepted {
            return Err(PutError::Remote(response.message));
        }
        Ok(())
    }

    /// Open, contents and hash phases.
    async fn stream(
        &mut self,
        channel: &mut dyn PutChannel,
        reader: &mut ChunkReader<tokio::fs::File>,
    ) -> Result<(), PutError> {
        let target = self.target;
        let plan = self.plan;
        let target_id = target.target_id();

        self.transition(SessionState::Opening);
        let details = plan.details();
        info!(
            target_id = %target_id,
            session = %self.session_id,
            remote_file = %details.remote_file,
            "opening put session with permissions {:#o}",
            details.permissions
        );
        dump_request(target_id, || PutRequest::Open(details.clone()));
        self.until_cancelled(channel.send_open(&details)).await?;

        self.transition(SessionState::Sending);
        let mut digest = DigestAccumulator::new(plan.hash_method);
        loop {
            let next = self
                .until_cancelled(async {
                    let offset = reader.offset();
                    reader.next_chunk().await.map_err(|e| match e {
                        TransferError::Io(source) => PutError::Read {
                            offset,
                            source: source.into(),
                        },
                        other => PutError::from_transfer(&plan.local_path, other),
                    })
                })
                .await?;
            let Some(chunk) = next else {
                break;
            };

            // Hash exactly the bytes that go on the wire, in send order.
            digest.update(&chunk.data);
            info!(
                target_id = %target_id,
                session = %self.session_id,
                offset = chunk.offset,
                bytes = chunk.len(),
                "writing {} byte(s) to {:?}",
                chunk.len(),
                target_id
            );
            dump_request(target_id, || PutRequest::Contents(chunk.data.clone()));
            self.until_cancelled(channel.send_contents(&chunk.data))
                .await?;
        }

        self.transition(SessionState::DigestPending);
        let bytes = digest.bytes_hashed();
        let hash = digest.finalize();
        info!(
            target_id = %target_id,
            session = %self.session_id,
            bytes,
            method = %hash.method,
            "sending file hash to {:?}",
            target_id
        );
        dump_request(target_id, || PutRequest::Hash(hash.clone()));
        self.until_cancelled(channel.send_hash(&hash)).await?;

        Ok(())
    }

    /// Best-effort send-side close on abort paths.
    async fn release(&self, channel: &mut dyn PutChannel) {
        match tokio::time::timeout(RELEASE_TIMEOUT, channel.close_send()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session = %self.session_id, error = %e, "close after abort failed");
            }
            Err(_) => {
                warn!(session = %self.session_id, "close after abort timed out");
            }
        }
    }

    /// Races `fut` against the session's cancellation token.
    async fn until_cancelled<T>(
        &self,
        fut: impl Future<Output = Result<T, PutError>>,
    ) -> Result<T, PutError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PutError::Cancelled),
            result = fut => result,
        }
    }

    fn check_cancelled(&self) -> Result<(), PutError> {
        if self.cancel.is_cancelled() {
            Err(PutError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            session = %self.session_id,
            from = %self.state,
            to = %next,
            "session state"
        );
        self.state = next;
    }
}

/// Dumps a request as JSON when debug logging is enabled.
fn dump_request(target_id: &str, req: impl FnOnce() -> PutRequest) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    let req = req();
    match req.to_json() {
        Ok(json) => debug!(target_id = %target_id, kind = req.kind(), request = %json, "put request"),
        Err(e) => debug!(target_id = %target_id, error = %e, "put request dump failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, MockTarget, Sent};
    use fileput_protocol::HashMethod;
    use fileput_transfer::{TransferRequest, digest_bytes};

    async fn plan_for(data: &[u8], write_size_kb: u64, method: HashMethod) -> (tempfile::TempDir, PutPlan) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        std::fs::write(&path, data).unwrap();
        let request = TransferRequest::new(&path)
            .with_write_size_kb(write_size_kb)
            .with_hash_method(method);
        let plan = PutPlan::resolve(&request).await.unwrap();
        (dir, plan)
    }

    fn contents_of(sent: &[Sent]) -> Vec<Vec<u8>> {
        sent.iter()
            .filter_map(|s| match s {
                Sent::Contents(d) => Some(d.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn happy_path_sends_in_order() {
        let data: Vec<u8> = (0..2_500u32).map(|i| (i % 251) as u8).collect();
        let (_dir, plan) = plan_for(&data, 1, HashMethod::Sha256).await;
        let target = MockTarget::new("t1");

        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.target_id, "t1");
        assert_eq!(result.remote_file, "payload.bin");

        let sent = target.sent();
        assert!(matches!(&sent[0], Sent::Open(d) if d.remote_file == "payload.bin"));
        assert!(matches!(&sent[1], Sent::Contents(d) if d.len() == 1000));
        assert!(matches!(&sent[2], Sent::Contents(d) if d.len() == 1000));
        assert!(matches!(&sent[3], Sent::Contents(d) if d.len() == 500));
        assert!(matches!(&sent[4], Sent::Hash(_)));
        assert_eq!(sent[5], Sent::CloseSend);
        assert_eq!(sent.len(), 6);
    }

    #[tokio::test]
    async fn digest_covers_exactly_the_sent_bytes() {
        let data = vec![0xC3u8; 10_001];
        for method in [HashMethod::Md5, HashMethod::Sha256, HashMethod::Sha512] {
            let (_dir, plan) = plan_for(&data, 3, method).await;
            let target = MockTarget::new("t1");
            let result = SessionDriver::new(&target, &plan, CancellationToken::new())
                .run()
                .await;
            assert!(result.is_success());

            let sent = target.sent();
            let joined: Vec<u8> = contents_of(&sent).concat();
            assert_eq!(joined, data);
            let hash = sent
                .iter()
                .find_map(|s| match s {
                    Sent::Hash(h) => Some(h.clone()),
                    _ => None,
                })
                .unwrap();
            assert_eq!(hash.method, method);
            assert_eq!(hash.hash, digest_bytes(method, &joined));
        }
    }

    #[tokio::test]
    async fn chunks_never_exceed_write_size() {
        let data = vec![7u8; 7_777];
        let (_dir, plan) = plan_for(&data, 2, HashMethod::Md5).await;
        let target = MockTarget::new("t1");
        SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;

        let chunks = contents_of(&target.sent());
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= 2_000));
    }

    #[tokio::test]
    async fn empty_file_sends_open_and_hash_only() {
        let (_dir, plan) = plan_for(b"", 64, HashMethod::Md5).await;
        let target = MockTarget::new("t1");
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(result.is_success());

        let sent = target.sent();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[0], Sent::Open(_)));
        match &sent[1] {
            Sent::Hash(h) => assert_eq!(h.hash, digest_bytes(HashMethod::Md5, b"")),
            other => panic!("expected hash, got {other:?}"),
        }
        assert_eq!(sent[2], Sent::CloseSend);
    }

    #[tokio::test]
    async fn unknown_hash_identifier_uses_md5() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::normalize("tiger192")).await;
        let target = MockTarget::new("t1");
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(result.is_success());
        let hash = target
            .sent()
            .into_iter()
            .find_map(|s| match s {
                Sent::Hash(h) => Some(h),
                _ => None,
            })
            .unwrap();
        assert_eq!(hash.method, HashMethod::Md5);
        assert_eq!(hash.hash.len(), 16);
    }

    #[tokio::test]
    async fn open_failure_sends_nothing_else() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            fail_open: true,
            ..Behavior::default()
        });
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(matches!(result.error, Some(PutError::Transport { .. })));
        assert_eq!(target.sent(), vec![Sent::CloseSend]);
    }

    #[tokio::test]
    async fn contents_failure_aborts_before_hash() {
        let data = vec![1u8; 5_000];
        let (_dir, plan) = plan_for(&data, 1, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            fail_contents_at: Some(2),
            ..Behavior::default()
        });
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(matches!(result.error, Some(PutError::Transport { .. })));

        let sent = target.sent();
        assert_eq!(contents_of(&sent).len(), 2);
        assert!(!sent.iter().any(|s| matches!(s, Sent::Hash(_))));
        assert_eq!(sent.last(), Some(&Sent::CloseSend));
    }

    #[tokio::test]
    async fn establishment_failure_is_captured() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            fail_connect: true,
            ..Behavior::default()
        });
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(matches!(result.error, Some(PutError::Connect(_))));
        assert!(target.sent().is_empty());
    }

    #[tokio::test]
    async fn remote_rejection_is_an_error() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            reject: Some("hash mismatch".into()),
            ..Behavior::default()
        });
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        match result.error {
            Some(PutError::Remote(msg)) => assert_eq!(msg, "hash mismatch"),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_before_start_never_connects() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        let target = MockTarget::new("t1");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = SessionDriver::new(&target, &plan, cancel).run().await;
        assert!(matches!(result.error, Some(PutError::Cancelled)));
        assert_eq!(target.connects(), 0);
    }

    #[tokio::test]
    async fn cancel_mid_stream_releases_channel() {
        let data = vec![1u8; 3_000];
        let (_dir, plan) = plan_for(&data, 1, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            hang_contents: true,
            ..Behavior::default()
        });
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };
        let result = SessionDriver::new(&target, &plan, cancel).run().await;
        canceller.await.unwrap();

        assert!(matches!(result.error, Some(PutError::Cancelled)));
        assert_eq!(target.sent().last(), Some(&Sent::CloseSend));
    }

    #[tokio::test]
    async fn cancel_while_closing_still_closes_once() {
        let (_dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        let target = MockTarget::with("t1", Behavior {
            hang_recv: true,
            ..Behavior::default()
        });
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };
        let result = SessionDriver::new(&target, &plan, cancel).run().await;
        canceller.await.unwrap();

        assert!(matches!(result.error, Some(PutError::Cancelled)));
        let sent = target.sent();
        assert!(matches!(sent[sent.len() - 2], Sent::Hash(_)));
        assert_eq!(sent.last(), Some(&Sent::CloseSend));
        // The abort path calls close_send again; the channel ignores it.
        assert_eq!(sent.iter().filter(|s| **s == Sent::CloseSend).count(), 1);
        assert_eq!(target.close_calls(), 2);
    }

    #[tokio::test]
    async fn missing_local_file_fails_before_connect() {
        let (dir, plan) = plan_for(b"abc", 64, HashMethod::Md5).await;
        std::fs::remove_file(dir.path().join("payload.bin")).unwrap();
        let target = MockTarget::new("t1");
        let result = SessionDriver::new(&target, &plan, CancellationToken::new())
            .run()
            .await;
        assert!(matches!(result.error, Some(PutError::LocalSource { .. })));
        assert_eq!(target.connects(), 0);
    }

    #[test]
    fn new_driver_starts_created() {
        let plan = PutPlan {
            local_path: "x".into(),
            remote_file: "x".into(),
            permissions: 0o644,
            hash_method: HashMethod::Md5,
            chunk_size: 1,
        };
        let target = MockTarget::new("t1");
        let driver = SessionDriver::new(&target, &plan, CancellationToken::new());
        assert_eq!(driver.state(), SessionState::Created);
    }
}
