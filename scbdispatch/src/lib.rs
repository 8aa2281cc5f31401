//! # scbdispatch - Scrobble fan-out for SCBridge
//!
//! Implements the dispatcher contract from [`scbcore`]: new plays arriving
//! from any poller are deduplicated process-wide and relayed to every
//! targeted downstream scrobble client, preserving order per client and
//! isolating per-client failures.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scbdispatch::{FanoutDispatcher, MemoryClient};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(FanoutDispatcher::new(vec![
//!     Arc::new(MemoryClient::new("maloja")),
//! ]));
//! // Hand the dispatcher to each SourcePoller.
//! ```

pub mod client;
pub mod error;
pub mod fanout;

pub use client::{MemoryClient, ScrobbleClient};
pub use error::{Error, Result};
pub use fanout::{FanoutDispatcher, DEFAULT_LEDGER_CAPACITY};
