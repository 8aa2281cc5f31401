//! HTTP client for listens-style history APIs.

use super::models::ListensResponse;
use crate::error::{Error, Result};
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Default number of listens requested per poll
pub const DEFAULT_FETCH_COUNT: usize = 25;

/// Default timeout for metadata HTTP requests
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "scbsources/0.1.0";

/// Client for a listens history service.
///
/// # Example
///
/// ```no_run
/// use scbsources::ListensClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = ListensClient::builder("https://listens.example", "alice").build()?;
///     let history = client.recent_listens(25).await?;
///     println!("{} listens", history.payload.listens.len());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ListensClient {
    client: Client,
    base_url: String,
    user: String,
    token: Option<String>,
}

impl ListensClient {
    /// Create a builder for configuring the client
    pub fn builder(base_url: impl Into<String>, user: impl Into<String>) -> ListensClientBuilder {
        ListensClientBuilder {
            base_url: base_url.into(),
            user: user.into(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// User whose history this client reads
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Fetch the most recent completed listens, newest-first as the
    /// upstream returns them.
    pub async fn recent_listens(&self, count: usize) -> Result<ListensResponse> {
        let mut url = Url::parse(&format!(
            "{}/1/user/{}/listens",
            self.base_url.trim_end_matches('/'),
            self.user
        ))?;
        url.query_pairs_mut()
            .append_pair("count", &count.to_string());
        self.get(url).await
    }

    /// Fetch the currently playing track, if any.
    pub async fn playing_now(&self) -> Result<ListensResponse> {
        let url = Url::parse(&format!(
            "{}/1/user/{}/playing-now",
            self.base_url.trim_end_matches('/'),
            self.user
        ))?;
        self.get(url).await
    }

    async fn get(&self, url: Url) -> Result<ListensResponse> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {token}"));
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

/// Builder for configuring a [`ListensClient`]
#[derive(Debug)]
pub struct ListensClientBuilder {
    base_url: String,
    user: String,
    token: Option<String>,
    timeout: Duration,
    user_agent: String,
}

impl ListensClientBuilder {
    /// Set the API token sent as an `Authorization` header
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

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
    pub fn build(self) -> Result<ListensClient> {
        let client = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(self.timeout)
            .build()?;
        Ok(ListensClient {
            client,
            base_url: self.base_url,
            user: self.user,
            token: self.token,
        })
    }
}
