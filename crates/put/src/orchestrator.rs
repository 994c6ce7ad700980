//! Put orchestrator for multi-target parallel uploads.
//!
//! Resolves the request once, fans out one session per target, and
//! waits for every session to report before returning.

use std::sync::Arc;

use fileput_transfer::TransferRequest;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::channel::TargetConnection;
use crate::error::PutError;
use crate::session::SessionDriver;
use crate::types::{PutPlan, TransferResult};

/// Orchestrates a put to multiple targets.
pub struct PutOrchestrator {
    cancel: CancellationToken,
}

impl Default for PutOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PutOrchestrator {
    /// Creates a new orchestrator with its own root cancellation token.
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an orchestrator whose sessions are cancelled with `parent`.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
        }
    }

    /// Returns the token that cancels every in-flight session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Puts the requested file on every target in parallel.
    ///
    /// Each target runs independently; a failure never cancels the
    /// others. Returns exactly one result per target, in completion
    /// order.
    pub async fn put(
        &self,
        request: &TransferRequest,
        targets: Vec<Arc<dyn TargetConnection>>,
    ) -> Vec<TransferResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        let plan = match PutPlan::resolve(request).await {
            Ok(plan) => Arc::new(plan),
            Err(e) => {
                error!(
                    path = %request.local_path.display(),
                    error = %e,
                    "cannot prepare put"
                );
                return targets
                    .iter()
                    .map(|t| TransferResult::failed(t.target_id(), String::new(), e.clone()))
                    .collect();
            }
        };

        let total = targets.len();
        info!(
            targets = total,
            remote_file = %plan.remote_file,
            chunk_size = plan.chunk_size,
            method = %plan.hash_method,
            "starting put"
        );

        // One slot per target: every send completes without waiting.
        let (results_tx, mut results_rx) = mpsc::channel(total);
        let mut handles = Vec::with_capacity(total);

        for target in targets {
            let target_id = target.target_id().to_string();
            let results_tx = results_tx.clone();
            let plan = plan.clone();
            let cancel = self.cancel.child_token();

            let handle = tokio::spawn(async move {
                let result = SessionDriver::new(target.as_ref(), &plan, cancel)
                    .run()
                    .await;
                let _ = results_tx.send(result).await;
            });
            handles.push((target_id, handle));
        }
        drop(results_tx);

        // Barrier: wait for every session before collecting.
        let mut results = Vec::with_capacity(total);
        for (target_id, handle) in handles {
            if let Err(e) = handle.await {
                error!(target_id = %target_id, error = %e, "session task died");
                results.push(TransferResult::failed(
                    target_id,
                    plan.remote_file.clone(),
                    PutError::Task(e.to_string()),
                ));
            }
        }
        while let Some(result) = results_rx.recv().await {
            results.push(result);
        }

        results
    }
}
