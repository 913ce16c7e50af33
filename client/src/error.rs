//! Error types for the sync client

use crate::network::ConnectionState;
use shared::ProtocolError;

/// Everything that can go wrong between the server and the local mirror.
///
/// Transport failures are surfaced to consumers as a `Connect(false)` event
/// by the session; protocol failures only ever cost the offending frame.
/// The remaining variants are state errors and mostly indicate caller misuse.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("map {width}x{height} carries {actual} pixels")]
    InvalidMap {
        width: u32,
        height: u32,
        actual: usize,
    },

    #[error("connection is not open (state: {state:?})")]
    NotConnected { state: ConnectionState },

    #[error("observer connections cannot send messages")]
    ReadOnly,

    #[error("command `{0}` is not available this turn")]
    UnknownCommand(String),

    #[error("no command selected")]
    NoCommandSelected,

    #[error("({x}, {y}) is not a valid target for `{command}`")]
    InvalidTarget { command: String, x: u32, y: u32 },
}

impl ClientError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::WebSocket(_) | ClientError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
