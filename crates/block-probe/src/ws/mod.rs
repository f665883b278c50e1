//! Websocket subscription to a CometBFT/Tendermint node.

mod session;

pub use session::{
    ProbeEvent, Session, SessionOutcome, SessionState, NEW_BLOCK_QUERY, SUBSCRIPTION_ID,
};
