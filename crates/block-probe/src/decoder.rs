//! # Notification Decoder
//!
//! Turns one websocket frame into a [`Notification`]. Text and binary frames
//! are treated alike: both carry UTF-8 JSON.
//!
//! The first frame after subscribing is the node's acknowledgement
//! (`"result": {}`); it carries no header and therefore no height. Every later
//! frame carries one block.

use crate::domain::{BlockResult, Envelope, ProbeError, ProbeResult};

/// A decoded subscription frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Subscription accepted; no block attached.
    Acknowledged,
    /// A committed block with its transaction hashes.
    Block(BlockResult),
}

/// Parse a frame into its envelope without hashing.
pub fn decode_envelope(frame: impl AsRef<[u8]>) -> ProbeResult<Envelope> {
    let envelope: Envelope = serde_json::from_slice(frame.as_ref())?;

    if let Some(error) = &envelope.error {
        return Err(ProbeError::Rpc {
            code: error.code,
            message: match &error.data {
                Some(data) if !data.is_empty() => format!("{} ({})", error.message, data),
                _ => error.message.clone(),
            },
        });
    }

    Ok(envelope)
}

/// Decode a frame and, for block frames, hash its transactions.
pub fn decode_notification(frame: impl AsRef<[u8]>) -> ProbeResult<Notification> {
    let envelope = decode_envelope(frame)?;

    if envelope.is_acknowledgement() {
        return Ok(Notification::Acknowledged);
    }

    BlockResult::from_envelope(&envelope).map(Notification::Block)
}
