//! # Transaction Hashing
//!
//! A CometBFT transaction id is `SHA-256(raw tx bytes)`. The RPC layer embeds
//! raw bytes as standard (padded) base64, so hashing is decode-then-digest.
//! The resulting value can be looked up directly with the node's `tx` endpoint.

use std::collections::BTreeSet;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use super::errors::{ProbeError, ProbeResult};

/// SHA-256 digest of one transaction's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Hash raw transaction bytes.
    pub fn digest(raw: &[u8]) -> Self {
        Self(Sha256::digest(raw).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Uppercase hex, as shown by block explorers.
    pub fn to_upper_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Decode one base64 transaction and hash its raw bytes.
pub fn hash_transaction(encoded: &str) -> Result<TxHash, base64::DecodeError> {
    let raw = STANDARD.decode(encoded)?;
    Ok(TxHash::digest(&raw))
}

/// Hash every transaction of a block into a set.
///
/// Transactions that decode to identical bytes collapse into one entry. The
/// first invalid transaction aborts the whole block.
pub fn hash_block<S: AsRef<str>>(txs: &[S]) -> ProbeResult<BTreeSet<TxHash>> {
    txs.iter()
        .enumerate()
        .map(|(index, tx)| {
            hash_transaction(tx.as_ref()).map_err(|source| ProbeError::PayloadDecode { index, source })
        })
        .collect()
}
