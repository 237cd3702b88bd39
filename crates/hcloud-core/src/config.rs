//! Connection configuration for the Hetzner Cloud API.
//!
//! Holds the endpoint, the API token and the request knobs, validated before
//! any client is built.

use crate::client::{ClientConfig, HCLOUD_DEFAULT_TIMEOUT};
use crate::query::MAX_PER_PAGE;
use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use validator::Validate;

/// Production API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.hetzner.cloud/v1";

/// Environment variable holding the API token.
pub const TOKEN_ENV_VAR: &str = "HETZNER_API_TOKEN";

/// Configuration for a Hetzner Cloud client instance.
#[derive(Debug, Validate)]
pub struct HcloudConfig {
    /// API base URL
    #[validate(url)]
    pub api_url: String,

    /// Project API token
    pub token: SecretString,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    /// Page size used when listing resources
    #[validate(range(min = 1, max = 50))]
    pub per_page: u32,
}

impl HcloudConfig {
    /// Create a configuration for the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty.
    pub fn new(token: impl Into<String>) -> Result<Self, Error> {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Err(Error::ConfigError("API token is empty".to_string()));
        }

        Ok(Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: SecretString::from(token),
            request_timeout_secs: HCLOUD_DEFAULT_TIMEOUT,
            per_page: MAX_PER_PAGE,
        })
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the list page size.
    #[must_use]
    pub const fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }

    /// HTTP settings derived from this configuration.
    #[must_use]
    pub const fn client_config(&self) -> ClientConfig {
        ClientConfig::new().with_timeout(self.timeout())
    }

    /// Validate all fields.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid field set.
    pub fn check(&self) -> Result<(), Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))
    }
}
