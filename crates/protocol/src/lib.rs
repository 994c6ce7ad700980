//! Message types and binary wire codec for fileput put sessions.
//!
//! A put session is a strictly ordered stream of requests:
//! one [`PutRequest::Open`], zero or more [`PutRequest::Contents`],
//! one [`PutRequest::Hash`], then end-of-stream. The remote answers
//! with a single [`PutResponse`].

pub mod constants;
pub mod error;
pub mod messages;
pub mod wire;

// Re-export primary types for convenience.
pub use error::WireError;
pub use messages::{HashMethod, HashType, PutDetails, PutRequest, PutResponse};
