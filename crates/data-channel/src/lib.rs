//! TCP data channel for put sessions.
//!
//! The [`client::PutClient`] is the sending end used by targets. The
//! [`server::TcpPutServer`] is the receiving end: it authenticates each
//! connection with a token, writes the streamed file under its root and
//! verifies the digest before answering.
//!
//! # Wire format
//!
//! See [`fileput_protocol::wire`] for the frame layout.

pub mod client;
pub mod error;
pub mod server;
pub mod token;

pub use client::PutClient;
pub use error::DataChannelError;
pub use server::{ServerInfo, TcpPutServer};
pub use token::{generate_token, is_well_formed, validate_token};

use std::time::Duration;

/// TCP read/write buffer size (256 KB).
pub const TCP_BUFFER_SIZE: usize = 256 * 1024;

/// Longest the server waits for the next frame of an open session.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(60);
