//! Per-block output of the probe.

use std::collections::BTreeSet;

use super::envelope::Envelope;
use super::errors::{ProbeError, ProbeResult};
use super::hash::{hash_block, TxHash};

/// Height of a block paired with the set of its transaction hashes.
///
/// The set collapses transactions with identical raw bytes, so `hashes.len()`
/// may be smaller than `tx_count`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    pub height: u64,
    pub chain_id: String,
    pub time: String,
    pub tx_count: usize,
    pub hashes: BTreeSet<TxHash>,
}

impl BlockResult {
    /// Build the result for a block envelope.
    ///
    /// Callers must have already filtered out acknowledgements.
    pub fn from_envelope(envelope: &Envelope) -> ProbeResult<Self> {
        let height = parse_height(envelope.height())?;
        let txs = envelope.transactions();
        let hashes = hash_block(txs)?;
        let header = envelope.header();

        Ok(Self {
            height,
            chain_id: header.chain_id.clone(),
            time: header.time.clone(),
            tx_count: txs.len(),
            hashes,
        })
    }

    /// Number of transactions whose raw bytes repeated an earlier one.
    pub fn duplicate_count(&self) -> usize {
        self.tx_count - self.hashes.len()
    }
}

fn parse_height(height: &str) -> ProbeResult<u64> {
    height.parse::<u64>().map_err(|_| ProbeError::InvalidHeight {
        height: height.to_owned(),
    })
}
