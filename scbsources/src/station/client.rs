//! HTTP client for station now-playing APIs.

use super::models::StationStatus;
use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default timeout for status requests
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "scbsources/0.1.0";

/// Client for a station's public now-playing endpoint.
#[derive(Debug, Clone)]
pub struct StationClient {
    client: Client,
    base_url: String,
    station: String,
}

impl StationClient {
    /// Create a builder for configuring the client
    pub fn builder(base_url: impl Into<String>, station: impl Into<String>) -> StationClientBuilder {
        StationClientBuilder {
            base_url: base_url.into(),
            station: station.into(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Station shortcode this client polls
    pub fn station(&self) -> &str {
        &self.station
    }

    /// Fetch the current song and recent history for the station.
    pub async fn now_playing(&self) -> Result<StationStatus> {
        let url = Url::parse(&format!(
            "{}/api/nowplaying/{}",
            self.base_url.trim_end_matches('/'),
            self.station
        ))?;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// Builder for configuring a [`StationClient`]
#[derive(Debug)]
pub struct StationClientBuilder {
    base_url: String,
    station: String,
    timeout: Duration,
    user_agent: String,
}

impl StationClientBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the client
    pub fn build(self) -> Result<StationClient> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?;
        Ok(StationClient {
            client,
            base_url: self.base_url,
            station: self.station,
        })
    }
}
