//! # scbcore - Source polling engine for SCBridge
//!
//! `scbcore` owns the hard part of relaying listening history: the
//! long-lived control loop that repeatedly queries an upstream music
//! service, decides which plays are genuinely new under noisy and
//! inconsistent API responses, throttles itself during quiet periods, and
//! hands fresh plays to a downstream dispatcher without creating duplicate
//! scrobbles across cooperating clients.
//!
//! ## Components
//!
//! - [`PlayRecord`]: canonical in-memory representation of one play event
//! - [`Clock`] / [`sleep_or_cancelled`]: second-precision time source and
//!   cancellable delay primitive
//! - [`reconcile_window`]: pure reconciliation of untimestamped recent
//!   windows (bumps, additions, inconsistent reorderings)
//! - [`SourcePoller`]: per-source polling state machine with adaptive
//!   backoff and the close-to-interval hedge
//! - [`Dispatch`] / [`PlaySource`]: the seams towards downstream scrobble
//!   fan-out and upstream adapters
//!
//! ## Quick Start
//!
//! ```no_run
//! use scbcore::{PollerConfig, SourcePoller};
//! use std::sync::Arc;
//!
//! # async fn demo(
//! #     source: Arc<dyn scbcore::PlaySource>,
//! #     dispatcher: Arc<dyn scbcore::Dispatch>,
//! # ) {
//! let poller = SourcePoller::builder(source, dispatcher)
//!     .config(PollerConfig::default())
//!     .clients(vec!["maloja".to_string()])
//!     .build();
//!
//! poller.start();
//! // ... later
//! poller.stop();
//! # }
//! ```
//!
//! Pollers run as independent tokio tasks and share only the dispatcher.
//! Cycle-level failures land the poller in a `Faulted` state for an
//! external supervisor to restart; nothing is persisted by this crate.

pub mod clock;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod reconcile;
pub mod record;
pub mod source;

pub use clock::{minute_floor, second_floor, sleep_or_cancelled, Clock, ManualClock, SystemClock};
pub use config::PollerConfig;
pub use diff::ListDiff;
pub use dispatch::{Dispatch, DispatchOptions};
pub use error::{Error, Result};
pub use poller::{PollerBuilder, PollerLifecycle, PollerStatus, SourcePoller};
pub use reconcile::{reconcile_window, Reconciled, WindowVerdict};
pub use record::{PlayData, PlayKey, PlayMeta, PlayRecord};
pub use source::{PlaySource, SourceMode};
