//! # Block Probe
//!
//! Subscribes to `tm.event='NewBlock'` on a CometBFT/Tendermint node and
//! reports, for every committed block, its height and the SHA-256 hashes of
//! its transactions. The hashes are the chain's own transaction ids, so each
//! one can be looked up with the node's `tx` endpoint.
//!
//! The probe holds no state across blocks, validates nothing and persists
//! nothing. Decoding transactions into application messages is left to the
//! chain's own tooling.
//!
//! ## Layout
//!
//! - `domain/` - Envelope model, transaction hashing, block results, errors
//! - `decoder` - Frame → acknowledgement or block
//! - `ws/` - Subscription session over a websocket
//! - `report` - Line-oriented output
//! - `config` - Connection settings
//!
//! ## Flow
//!
//! ```text
//! Session ──connect──→ node /websocket
//!    │ subscribe(tm.event='NewBlock')
//!    ↓
//! read task ──frame──→ decoder ──txs──→ hasher
//!                                         │
//!                               ProbeEvent::Block ──mpsc──→ Reporter
//! ```

pub mod config;
pub mod decoder;
pub mod domain;
pub mod report;
pub mod ws;

pub use config::{ProbeConfig, Scheme};
pub use decoder::{decode_envelope, decode_notification, Notification};
pub use domain::{
    hash_block, hash_transaction, BlockResult, Envelope, ProbeError, ProbeResult, TxHash,
};
pub use report::Reporter;
pub use ws::{ProbeEvent, Session, SessionOutcome, SessionState};
