//! Transport layer for socket communication
//!
//! The transport layer is organized into:
//! - `codec`: NDJSON encoding/decoding for messages
//! - `async_transport`: Tokio-based client and server-side connection

use thiserror::Error;

mod async_transport;
pub mod codec;

pub use async_transport::{AsyncConnection, AsyncTransport};
pub use codec::encode_server_message;

/// Default Unix socket path for the sermon-flow service
pub const DEFAULT_SOCKET_PATH: &str = "/run/user/$UID/sermon-flow/sermon-flow.sock";

/// Socket error types
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("Socket connection error: {0}")]
    Connection(String),
    #[error("Socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
