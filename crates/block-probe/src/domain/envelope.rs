//! # Notification Envelope
//!
//! Wire shape of a frame pushed by a CometBFT/Tendermint node on a
//! `tm.event='NewBlock'` subscription.
//!
//! Only two fields drive behavior: `result.data.value.block.header.height` and
//! `result.data.value.block.data.txs`. Both are strictly typed. Everything else
//! is parsed with [`lenient`], so a node that changes the type of some
//! consensus field never breaks decoding; the field just falls back to its
//! default.
//!
//! ```text
//! {
//!   "jsonrpc": "2.0", "id": 1,
//!   "result": {
//!     "query": "tm.event='NewBlock'",
//!     "data": {
//!       "type": "tendermint/event/NewBlock",
//!       "value": {
//!         "block": { "header": { "height": "100", ... }, "data": { "txs": [...] }, ... },
//!         "result_begin_block": { ... },
//!         "result_end_block": { ... }
//!       }
//!     },
//!     "events": { "tm.event": ["NewBlock"], ... }
//!   }
//! }
//! ```

use std::collections::HashMap;

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;

/// Deserialize `T`, falling back to `T::default()` on a type mismatch.
///
/// The value is first buffered as JSON, so malformed JSON still fails the
/// whole frame. Only well-formed values of the wrong shape are forgiven.
pub fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Deserialize `T`, reading an explicit `null` as `T::default()`.
///
/// Unlike [`lenient`], a value of the wrong shape still fails.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One inbound subscription frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Envelope {
    #[serde(deserialize_with = "lenient")]
    pub jsonrpc: String,
    #[serde(deserialize_with = "lenient")]
    pub id: Option<i64>,
    #[serde(deserialize_with = "null_as_default")]
    pub result: EventResult,
    pub error: Option<RpcErrorObject>,
}

impl Envelope {
    /// Block height as sent on the wire. Empty for the subscribe acknowledgement.
    pub fn height(&self) -> &str {
        &self.result.data.value.block.header.height
    }

    /// Encoded transactions in block order. `null` on the wire reads as empty.
    pub fn transactions(&self) -> &[String] {
        self.result
            .data
            .value
            .block
            .data
            .txs
            .as_deref()
            .unwrap_or_default()
    }

    /// True when this frame opens the subscription rather than reporting a block.
    pub fn is_acknowledgement(&self) -> bool {
        self.height().is_empty()
    }

    pub fn header(&self) -> &Header {
        &self.result.data.value.block.header
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(deserialize_with = "lenient")]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventResult {
    #[serde(deserialize_with = "lenient")]
    pub query: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data: EventData,
    /// Flattened `type.attribute -> [values]` index of every event in the block.
    #[serde(deserialize_with = "lenient")]
    pub events: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventData {
    #[serde(rename = "type", deserialize_with = "lenient")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: NewBlockValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewBlockValue {
    #[serde(deserialize_with = "null_as_default")]
    pub block: Block,
    #[serde(deserialize_with = "lenient")]
    pub result_begin_block: ResultBeginBlock,
    #[serde(deserialize_with = "lenient")]
    pub result_end_block: ResultEndBlock,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Block {
    #[serde(deserialize_with = "null_as_default")]
    pub header: Header,
    #[serde(deserialize_with = "null_as_default")]
    pub data: BlockData,
    #[serde(deserialize_with = "lenient")]
    pub evidence: EvidenceList,
    #[serde(deserialize_with = "lenient")]
    pub last_commit: Commit,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Header {
    #[serde(deserialize_with = "lenient")]
    pub version: Version,
    #[serde(deserialize_with = "lenient")]
    pub chain_id: String,
    pub height: String,
    /// RFC 3339 timestamp, kept as text.
    #[serde(deserialize_with = "lenient")]
    pub time: String,
    #[serde(deserialize_with = "lenient")]
    pub last_block_id: BlockId,
    #[serde(deserialize_with = "lenient")]
    pub last_commit_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub data_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub validators_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub next_validators_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub consensus_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub app_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub last_results_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub evidence_hash: String,
    #[serde(deserialize_with = "lenient")]
    pub proposer_address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Version {
    pub block: String,
    pub app: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockId {
    pub hash: String,
    pub parts: PartSetHeader,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockData {
    pub txs: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EvidenceList {
    pub evidence: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Commit {
    pub height: String,
    pub round: i32,
    pub block_id: BlockId,
    pub signatures: Vec<CommitSig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommitSig {
    pub block_id_flag: i32,
    pub validator_address: String,
    pub timestamp: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultBeginBlock {
    pub events: Vec<AbciEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ResultEndBlock {
    pub validator_updates: Option<Vec<ValidatorUpdate>>,
    pub consensus_param_updates: Option<ConsensusParams>,
    pub events: Vec<AbciEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AbciEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    pub index: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidatorUpdate {
    pub pub_key: PubKey,
    pub power: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PubKey {
    #[serde(rename = "Sum")]
    pub sum: PubKeySum,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PubKeySum {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: PubKeyValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PubKeyValue {
    pub ed25519: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub block: BlockParams,
    pub evidence: EvidenceParams,
    pub validator: ValidatorParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlockParams {
    pub max_bytes: String,
    pub max_gas: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EvidenceParams {
    pub max_age_num_blocks: String,
    pub max_age_duration: String,
    pub max_bytes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ValidatorParams {
    pub pub_key_types: Vec<String>,
}
