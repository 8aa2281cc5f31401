//! Listens-style history source: timestamped plays over HTTP.

pub mod client;
pub mod models;
pub mod source;

pub use client::{ListensClient, ListensClientBuilder};
pub use source::ListensSource;
