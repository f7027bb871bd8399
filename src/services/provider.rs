//! Weather provider interface and its HTTP implementation.
//!
//! The broker encodes the location (see [`encode_location`]) before calling
//! [`WeatherProvider::fetch`]; implementations embed the value as-is.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use std::time::Duration;

use crate::config::BrokerConfig;
use crate::errors::FetchError;

/// Source of raw weather payloads, one JSON document per location.
pub trait WeatherProvider: Send + Sync {
    /// Fetch the payload for an already percent-encoded location.
    fn fetch<'a>(&'a self, encoded_location: &'a str)
        -> BoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Form-style percent encoding of a location (`New York` → `New+York`).
pub fn encode_location(location: &str) -> String {
    url::form_urlencoded::byte_serialize(location.as_bytes()).collect()
}

/// Client for an OpenWeatherMap-style current weather endpoint.
///
/// Requests `GET <base_url>?q=<location>`.
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl HttpWeatherProvider {
    pub fn new(config: &BrokerConfig) -> Result<Self, FetchError> {
        Self::with_timeout(&config.base_url, &config.user_agent, config.fetch_timeout)
    }

    pub fn with_timeout(
        base_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::InvalidRequest(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    fn request_url(&self, encoded_location: &str) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!("{}{}q={}", self.base_url, separator, encoded_location)
    }

    async fn fetch_payload(&self, encoded_location: &str) -> Result<Vec<u8>, FetchError> {
        let url = self.request_url(encoded_location);

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| FetchError::InvalidRequest(format!("Invalid User-Agent: {}", e)))?,
        );

        tracing::debug!("Requesting {}", url);

        let response = self.client.get(&url).headers(headers).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        // Consumes the response, so the connection is released before parsing.
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

impl WeatherProvider for HttpWeatherProvider {
    fn fetch<'a>(
        &'a self,
        encoded_location: &'a str,
    ) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        self.fetch_payload(encoded_location).boxed()
    }
}
