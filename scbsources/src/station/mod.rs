//! Station now-playing source: untimestamped recent windows over HTTP.

pub mod client;
pub mod models;
pub mod source;

pub use client::{StationClient, StationClientBuilder};
pub use source::StationSource;
