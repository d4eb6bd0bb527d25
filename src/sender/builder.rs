use crate::config::RequestConfig;
use crate::error::{RequestError, Result};
use reqwest::Client;
use std::time::Duration;

/// Idle pool timeout applied when connection reuse is enabled.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
/// Idle connections kept per host when connection reuse is enabled.
const POOL_MAX_IDLE_PER_HOST: usize = 8;

/// Transport for signed requests, holding a pooled HTTP client.
///
/// Each client instance owns its own sender, so connection reuse never
/// crosses client boundaries. Per-request timeouts are applied at dispatch
/// time, not on the underlying pool.
#[derive(Debug, Clone)]
pub struct Sender {
    client: Client,
}

impl Sender {
    /// Builds a sender from the connection-level parts of a configuration.
    ///
    /// `keep_alive` toggles connection reuse; disabling it closes every
    /// connection after a single request. Disabling `reject_unauthorized`
    /// accepts invalid TLS certificates, which is meant for test targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &RequestConfig) -> Result<Self> {
        let mut builder = Client::builder();

        if config.keep_alive() {
            builder = builder
                .pool_idle_timeout(POOL_IDLE_TIMEOUT)
                .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST);
        } else {
            builder = builder.pool_max_idle_per_host(0);
        }

        if !config.reject_unauthorized() {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| RequestError::new(format!("Failed to build HTTP client: {e}"), 500))?;

        Ok(Self { client })
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}
