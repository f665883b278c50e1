//! # Domain Layer
//!
//! Pure data and pure functions. No I/O.
//!
//! - `envelope`: wire shape of a subscription frame
//! - `hash`: base64 transaction → SHA-256 content hash
//! - `block`: per-block result reported to the sink
//! - `errors`: crate error type

pub mod block;
pub mod envelope;
pub mod errors;
pub mod hash;

pub use block::BlockResult;
pub use envelope::Envelope;
pub use errors::{ProbeError, ProbeResult};
pub use hash::{hash_block, hash_transaction, TxHash};
