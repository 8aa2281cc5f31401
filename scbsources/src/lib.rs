//! # scbsources - Upstream adapters for SCBridge
//!
//! Concrete implementations of the [`scbcore::PlaySource`] contract:
//!
//! - [`ListensSource`]: a listens-history API with epoch-second timestamps
//!   (timestamp-driven newness)
//! - [`StationSource`]: a station now-playing API whose log carries no
//!   usable timestamps (window-driven newness)
//!
//! Each adapter owns its reqwest client, timeouts, and wire models, and
//! normalizes upstream entries into [`scbcore::PlayRecord`]s, dropping
//! malformed items with a warning instead of failing the cycle.
//!
//! ## Quick Start
//!
//! ```no_run
//! use scbsources::{ListensClient, ListensSource};
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ListensClient::builder("https://listens.example", "alice")
//!     .token("secret")
//!     .build()?;
//! let source = ListensSource::new(client, "listens-alice");
//! // Hand the source to a scbcore::SourcePoller.
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod listens;
pub mod station;

pub use error::{Error, Result};
pub use listens::{ListensClient, ListensClientBuilder, ListensSource};
pub use station::{StationClient, StationClientBuilder, StationSource};
