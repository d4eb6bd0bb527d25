//! Signed HTTP client facade.
//!
//! [`EscherClient`] ties the pieces together: it snapshots the configuration,
//! encodes the payload, builds the canonical request, has it signed, and
//! hands it to the transport. One client maps to one logical destination and
//! is cheap to call concurrently; every call works on its own snapshot.

use crate::config::{ConfigSnapshot, RequestConfig, RequestConfigOptions};
use crate::credentials::SecretString;
use crate::error::{RequestError, Result};
use crate::sender::{Sender, TransformedResponse};
use crate::signer::{EscherConfig, EscherSigner, SignableRequest, Signer};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, instrument};

/// HTTP client that signs every request before dispatch.
pub struct EscherClient {
    config: RequestConfig,
    signer: Box<dyn Signer>,
    sender: Sender,
}

impl EscherClient {
    /// Creates a client with the built-in Escher signer.
    ///
    /// The signing scope comes from the configuration when set, otherwise
    /// the default scope applies. Credentials are validated at signing time,
    /// so construction with bad credentials succeeds and the first call
    /// fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn new(
        access_key_id: impl Into<String>,
        api_secret: impl Into<SecretString>,
        config: RequestConfig,
    ) -> Result<Self> {
        let escher_config = match config.credential_scope() {
            Some(scope) => EscherConfig {
                credential_scope: scope.to_owned(),
                ..EscherConfig::default()
            },
            None => EscherConfig::default(),
        };
        let signer = Box::new(EscherSigner::new(access_key_id, api_secret, escher_config));
        Self::with_signer(config, signer)
    }

    /// Creates a client with a custom signer implementation.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be built.
    pub fn with_signer(config: RequestConfig, signer: Box<dyn Signer>) -> Result<Self> {
        let sender = Sender::new(&config)?;
        Ok(Self {
            config,
            signer,
            sender,
        })
    }

    /// Sends a GET request to `path` (relative to the configured prefix).
    pub async fn get(&self, path: &str) -> Result<TransformedResponse> {
        self.request(Method::GET, path, None).await
    }

    /// Sends a GET request carrying `data` as the payload.
    ///
    /// Some protected APIs accept filter payloads on GET; the body feeds the
    /// signature like any other payload.
    pub async fn get_with_data(&self, path: &str, data: &Value) -> Result<TransformedResponse> {
        self.request(Method::GET, path, Some(data)).await
    }

    /// Sends a POST request carrying `data` as the payload.
    pub async fn post(&self, path: &str, data: &Value) -> Result<TransformedResponse> {
        self.request(Method::POST, path, Some(data)).await
    }

    /// Sends a PUT request carrying `data` as the payload.
    pub async fn put(&self, path: &str, data: &Value) -> Result<TransformedResponse> {
        self.request(Method::PUT, path, Some(data)).await
    }

    /// Sends a PATCH request carrying `data` as the payload.
    pub async fn patch(&self, path: &str, data: &Value) -> Result<TransformedResponse> {
        self.request(Method::PATCH, path, Some(data)).await
    }

    /// Sends a DELETE request to `path`.
    pub async fn delete(&self, path: &str) -> Result<TransformedResponse> {
        self.request(Method::DELETE, path, None).await
    }

    /// Signs and sends a request.
    ///
    /// The payload is JSON-encoded unless the effective `content-type`
    /// header names a non-JSON type, in which case a string payload passes
    /// through verbatim and any other payload is rejected.
    ///
    /// # Errors
    ///
    /// Returns the uniform error for signing, transport, HTTP status, and
    /// body decoding failures.
    #[instrument(name = "escher_request", skip(self, data), fields(method = %method, path = %path))]
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        data: Option<&Value>,
    ) -> Result<TransformedResponse> {
        let snapshot = self.config.to_hash();
        let url = format!("{}{}", snapshot.prefix, path);
        let payload = match data {
            Some(data) => encode_payload(data, effective_content_type(&snapshot))?,
            None => String::new(),
        };

        let headers_to_sign: Vec<String> = snapshot
            .headers
            .iter()
            .map(|(name, _)| name.clone())
            .collect();

        let request = SignableRequest {
            method: method.clone(),
            host: snapshot.host.clone(),
            port: snapshot.port,
            url: url.clone(),
            headers: snapshot.headers.clone(),
            body: String::new(),
            timeout: snapshot.timeout,
            max_body_size: snapshot.max_body_size,
            allow_empty_response: snapshot.allow_empty_response,
            retry_policy: snapshot.retry_policy.clone(),
        };

        debug!(
            port = snapshot.port,
            timeout_ms = snapshot.timeout,
            payload_length = payload.len(),
            "Request options assembled"
        );

        let signed = self.signer.sign(&request, &payload, &headers_to_sign)?;

        info!(
            method = %method,
            host = %snapshot.host,
            url = %url,
            "Dispatching signed request"
        );

        self.sender.send(signed, self.config.secure()).await
    }

    /// Merges option overrides into the configuration.
    ///
    /// Connection-level overrides (keep-alive, TLS verification) rebuild
    /// the transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the rebuilt transport cannot be constructed.
    pub fn set_options(&mut self, options: RequestConfigOptions) -> Result<()> {
        let rebuild_sender =
            options.keep_alive.is_some() || options.reject_unauthorized.is_some();
        self.config.apply_options(options);
        if rebuild_sender {
            self.sender = Sender::new(&self.config)?;
        }
        Ok(())
    }

    /// Returns a snapshot of the current configuration.
    pub fn get_options(&self) -> ConfigSnapshot {
        self.config.to_hash()
    }

    /// The underlying configuration.
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    /// Mutable access to the underlying configuration.
    pub fn config_mut(&mut self) -> &mut RequestConfig {
        &mut self.config
    }
}

fn effective_content_type(snapshot: &ConfigSnapshot) -> Option<&str> {
    snapshot
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        .map(|(_, value)| value.as_str())
}

/// Encodes the payload for the wire.
///
/// A missing content type counts as JSON, so a freshly constructed
/// configuration always JSON-encodes. Under a non-JSON content type only
/// string payloads are accepted and pass through verbatim; anything else is
/// a fatal error rather than JSON mislabeled as another type.
fn encode_payload(data: &Value, content_type: Option<&str>) -> Result<String> {
    let is_json = content_type.map_or(true, |ct| ct.contains("application/json"));
    if is_json {
        return serde_json::to_string(data)
            .map_err(|e| RequestError::new(format!("Failed to encode payload: {e}"), 500));
    }
    match data {
        Value::String(s) => Ok(s.clone()),
        _ => Err(RequestError::new(
            format!(
                "Payload must be a string when content-type is {}",
                content_type.unwrap_or_default()
            ),
            500,
        )),
    }
}
