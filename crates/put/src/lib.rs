//! Concurrent put of one local file to many targets.
//!
//! This crate implements the **session logic** only. It has no transport
//! dependencies: the application provides a [`TargetConnection`] per
//! remote endpoint that knows how to open a [`PutChannel`].
//!
//! # Pipeline
//!
//! 1. **Plan**: resolve remote name and permissions once per request
//! 2. **Fan-out**: spawn one session per target
//! 3. **Session**: open, contents*, hash, close on each target's channel
//! 4. **Barrier**: wait for exactly one result per target
//! 5. **Report**: log each outcome and compute the aggregate verdict

pub mod channel;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export primary types for convenience.
pub use channel::{BoxFuture, PutChannel, TargetConnection};
pub use error::{Phase, PutError};
pub use orchestrator::PutOrchestrator;
pub use report::{Report, report};
pub use session::SessionDriver;
pub use types::{PutPlan, SessionState, TransferResult};
