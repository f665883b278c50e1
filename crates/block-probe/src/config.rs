//! # Probe Configuration
//!
//! Where to connect and how long to wait on shutdown. All values have sane
//! defaults; the binary fills them from CLI flags, then from the environment.

use std::time::Duration;

use clap::ValueEnum;

use crate::domain::{ProbeError, ProbeResult};

/// Public Cosmos Hub RPC endpoint, TLS-terminated on 443.
pub const DEFAULT_ADDR: &str = "cosmoshub.rpc.kjnodes.com:443";

/// Path of the CometBFT websocket endpoint.
pub const DEFAULT_PATH: &str = "/websocket";

/// How long a shutdown waits for the node to acknowledge the close frame.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Capacity of the event channel between session and reporter.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Websocket URL scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Scheme {
    /// TLS (`wss://`).
    #[default]
    Wss,
    /// Plain (`ws://`), e.g. a node's own RPC port 26657.
    Ws,
    /// `wss` when the port is 443, `ws` otherwise.
    Auto,
}

impl Scheme {
    fn resolve(self, addr: &str) -> &'static str {
        match self {
            Self::Wss => "wss",
            Self::Ws => "ws",
            Self::Auto => match addr.rsplit_once(':') {
                Some((_, "443")) => "wss",
                _ => "ws",
            },
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Node address as `host:port`.
    pub addr: String,
    pub scheme: Scheme,
    pub path: String,
    pub close_timeout: Duration,
    /// Render hashes in uppercase hex.
    pub uppercase_hashes: bool,
    pub event_capacity: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            scheme: Scheme::default(),
            path: DEFAULT_PATH.to_string(),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            uppercase_hashes: false,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ProbeConfig {
    /// Config for `addr` with every other field at its default.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Reject addresses the URL builder cannot use.
    ///
    /// The address is otherwise opaque; the websocket handshake is the real check.
    pub fn validate(&self) -> ProbeResult<()> {
        if self.addr.trim().is_empty() {
            return Err(ProbeError::InvalidConfig("address is empty".into()));
        }
        if self.addr.contains("://") {
            return Err(ProbeError::InvalidConfig(format!(
                "address {:?} must be host:port without a scheme",
                self.addr
            )));
        }
        if self.addr.contains('/') {
            return Err(ProbeError::InvalidConfig(format!(
                "address {:?} must not contain a path",
                self.addr
            )));
        }
        if !self.path.starts_with('/') {
            return Err(ProbeError::InvalidConfig(format!(
                "path {:?} must start with '/'",
                self.path
            )));
        }
        if self.event_capacity == 0 {
            return Err(ProbeError::InvalidConfig("event capacity must be non-zero".into()));
        }
        Ok(())
    }

    /// Full websocket URL, e.g. `wss://host:443/websocket`.
    pub fn endpoint_url(&self) -> String {
        format!("{}://{}{}", self.scheme.resolve(&self.addr), self.addr, self.path)
    }

    /// Apply `PROBE_ADDR` and `PROBE_CLOSE_TIMEOUT_MS` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("PROBE_ADDR") {
            if !addr.is_empty() {
                self.addr = addr;
            }
        }
        if let Some(ms) = lookup("PROBE_CLOSE_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) => self.close_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!("PROBE_CLOSE_TIMEOUT_MS must be an integer, got {:?}", ms),
            }
        }
    }
}
