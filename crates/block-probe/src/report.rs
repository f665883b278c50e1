//! # Reporting
//!
//! Line-oriented printer for [`ProbeEvent`]s. Each block yields one header line
//! followed by one line per distinct transaction hash:
//!
//! ```text
//! block height: 19283746 (txs: 3, unique: 2)
//! txs hash: 559aead08264d5795d3909718cdd05abd49572e84fe55590eef31a88a08fdffd
//! txs hash: df7e70e5021544f4834bbee64a9e3789febc4be81470df629cad6ddb03320a5c
//! ```

use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::ws::ProbeEvent;

/// Lines printed for one event.
pub fn format_event(event: &ProbeEvent, uppercase: bool) -> Vec<String> {
    match event {
        ProbeEvent::Subscribed => vec!["new connection made to node".to_string()],
        ProbeEvent::Block(block) => {
            let mut lines = Vec::with_capacity(block.hashes.len() + 1);
            lines.push(format!(
                "block height: {} (txs: {}, unique: {})",
                block.height,
                block.tx_count,
                block.hashes.len()
            ));
            lines.extend(block.hashes.iter().map(|hash| {
                let hex = if uppercase {
                    hash.to_upper_hex()
                } else {
                    hash.to_hex()
                };
                format!("txs hash: {}", hex)
            }));
            lines
        }
    }
}

/// Writes events to `out` in the order they arrive.
pub struct Reporter<W: Write> {
    out: W,
    uppercase: bool,
    blocks: u64,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, uppercase: bool) -> Self {
        Self {
            out,
            uppercase,
            blocks: 0,
        }
    }

    /// Blocks reported so far.
    pub fn blocks_reported(&self) -> u64 {
        self.blocks
    }

    pub fn report(&mut self, event: &ProbeEvent) -> io::Result<()> {
        for line in format_event(event, self.uppercase) {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()?;
        if matches!(event, ProbeEvent::Block(_)) {
            self.blocks += 1;
        }
        Ok(())
    }

    /// Drain `events` until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<ProbeEvent>) -> io::Result<Self> {
        while let Some(event) = events.recv().await {
            self.report(&event)?;
        }
        Ok(self)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
