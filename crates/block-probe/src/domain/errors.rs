//! # Probe Errors
//!
//! Every variant except `InvalidConfig` is fatal to a running session. None of
//! them trigger a reconnect; restart policy belongs to whatever supervises the
//! process.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors raised while connecting to a node or processing its notifications.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Websocket handshake with the node failed.
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },

    /// The subscribe request could not be serialized.
    #[error("failed to encode subscribe request: {0}")]
    EncodeRequest(#[source] serde_json::Error),

    /// The subscribe request could not be written.
    #[error("failed to send subscribe request: {0}")]
    Subscribe(#[source] tungstenite::Error),

    /// Reading the next frame failed.
    #[error("read: {0}")]
    Read(#[source] tungstenite::Error),

    /// A frame was not a well-formed notification.
    #[error("unmarshal: {0}")]
    ProtocolDecode(#[from] serde_json::Error),

    /// A frame carried a non-numeric block height.
    #[error("invalid block height {height:?}")]
    InvalidHeight { height: String },

    /// A transaction was not valid standard base64.
    #[error("decode tx #{index}: {source}")]
    PayloadDecode {
        index: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The reporting sink went away while blocks were still arriving.
    #[error("report sink closed")]
    SinkClosed,

    /// Configuration rejected before connecting.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl ProbeError {
    /// True for errors caused by the content of a frame rather than the transport.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::ProtocolDecode(_) | Self::InvalidHeight { .. } | Self::PayloadDecode { .. }
        )
    }
}

/// Result alias used across the crate.
pub type ProbeResult<T> = Result<T, ProbeError>;
