//! Aggregated reporting of per-target outcomes.

use tracing::{error, info};

use crate::error::PutError;
use crate::types::TransferResult;

/// Per-target results of one put, partitioned by outcome.
#[derive(Debug, Default)]
pub struct Report {
    successes: Vec<TransferResult>,
    failures: Vec<TransferResult>,
}

impl Report {
    pub fn new(results: impl IntoIterator<Item = TransferResult>) -> Self {
        let (successes, failures) = results.into_iter().partition(TransferResult::is_success);
        Self {
            successes,
            failures,
        }
    }

    /// Logs one line per target: errors first, then successes.
    pub fn log(&self) {
        for result in &self.failures {
            if let Some(e) = &result.error {
                error!(
                    target_id = %result.target_id,
                    category = e.category(),
                    error = %e,
                    "{}: {}",
                    result.target_id,
                    e.category()
                );
            }
        }
        for result in &self.successes {
            info!("{} file {} written", result.target_id, result.remote_file);
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn successes(&self) -> &[TransferResult] {
        &self.successes
    }

    pub fn failures(&self) -> &[TransferResult] {
        &self.failures
    }

    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Collapses the report into a single verdict.
    pub fn into_result(self) -> Result<Self, PutError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(PutError::Aggregate {
                failed: self.failures.len(),
                total: self.total(),
            })
        }
    }
}

/// Logs every result and returns an aggregate error if any target failed.
pub fn report(results: Vec<TransferResult>) -> Result<Report, PutError> {
    let report = Report::new(results);
    report.log();
    report.into_result()
}
