//! Request signing.
//!
//! The crate treats signing as a pluggable capability behind the [`Signer`]
//! trait: the client hands over a canonical [`SignableRequest`], the payload,
//! and the full list of header names to sign, and gets back a
//! [`SignedRequest`] extended with exactly two headers (the auth header and
//! the date header).
//!
//! [`EscherSigner`] is the built-in implementation of the Escher/EMS scheme
//! (an AWS-SigV4-style HMAC-SHA256 signature):
//!
//! 1. Canonical request: method, path, query, sorted lowercased signed
//!    headers, signed header names, and the hex SHA-256 of the payload.
//! 2. String to sign: `EMS-HMAC-SHA256`, the long timestamp
//!    (`YYYYMMDDTHHMMSSZ`), the credential scope, and the hex SHA-256 of the
//!    canonical request.
//! 3. Signing key: chained HMAC over the short date and each credential
//!    scope segment, seeded with `EMS` + the API secret.
//!
//! Signing is deterministic: identical inputs at the same wall-clock second
//! produce identical auth header values.

use crate::credentials::SecretString;
use crate::error::{RequestError, Result};
use crate::retry::RetryPolicy;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Method;
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Default credential scope used when the configuration does not set one.
pub const DEFAULT_CREDENTIAL_SCOPE: &str = "eu/suite/ems_request";

/// Canonical signable request, created fresh for every call.
///
/// `url` is the absolute path including the configuration prefix and any
/// query string; scheme, host and port are carried separately so the signer
/// and the sender can assemble what they each need.
#[derive(Debug, Clone)]
pub struct SignableRequest {
    /// HTTP method.
    pub method: Method,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Absolute path (prefix + caller path), optionally with a query string.
    pub url: String,
    /// Ordered header pairs (configuration headers plus per-call additions).
    pub headers: Vec<(String, String)>,
    /// Encoded payload, empty string when the call has no body.
    pub body: String,
    /// Per-call timeout in milliseconds.
    pub timeout: u64,
    /// Maximum response body size in bytes.
    pub max_body_size: usize,
    /// Whether an empty response body is tolerated.
    pub allow_empty_response: bool,
    /// Transport retry policy, passed through opaquely.
    pub retry_policy: Option<RetryPolicy>,
}

impl SignableRequest {
    /// Looks up a header value by case-insensitive name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A signable request extended with the auth and date headers.
///
/// Owned exclusively by the one in-flight call; the sender consumes it.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    request: SignableRequest,
}

impl SignedRequest {
    /// The signed request contents.
    pub fn request(&self) -> &SignableRequest {
        &self.request
    }

    /// Consumes the wrapper, yielding the signed request contents.
    pub fn into_inner(self) -> SignableRequest {
        self.request
    }
}

/// Pluggable request-signing capability.
///
/// Implementations must be deterministic (identical inputs and identical
/// wall-clock second yield identical output) and add exactly two headers.
/// A malformed credential configuration is a fatal error, never retried.
pub trait Signer: Send + Sync {
    /// Signs `request` over `payload`, covering `headers_to_sign`.
    fn sign(
        &self,
        request: &SignableRequest,
        payload: &str,
        headers_to_sign: &[String],
    ) -> Result<SignedRequest>;
}

/// Escher scheme constants and header names.
#[derive(Debug, Clone)]
pub struct EscherConfig {
    /// Algorithm prefix baked into the signature algorithm id (`EMS`).
    pub algo_prefix: String,
    /// Vendor key (`EMS`), kept for parity with the wire scheme.
    pub vendor_key: String,
    /// Credential scope binding signatures to a service/region namespace.
    pub credential_scope: String,
    /// Name of the generated auth header.
    pub auth_header_name: String,
    /// Name of the generated date header.
    pub date_header_name: String,
}

impl Default for EscherConfig {
    fn default() -> Self {
        Self {
            algo_prefix: "EMS".to_owned(),
            vendor_key: "EMS".to_owned(),
            credential_scope: DEFAULT_CREDENTIAL_SCOPE.to_owned(),
            auth_header_name: "X-Ems-Auth".to_owned(),
            date_header_name: "X-Ems-Date".to_owned(),
        }
    }
}

/// Built-in Escher (EMS-HMAC-SHA256) signer.
pub struct EscherSigner {
    access_key_id: String,
    api_secret: SecretString,
    config: EscherConfig,
}

impl EscherSigner {
    /// Creates a signer for the given credentials and scheme configuration.
    pub fn new(
        access_key_id: impl Into<String>,
        api_secret: impl Into<SecretString>,
        config: EscherConfig,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            api_secret: api_secret.into(),
            config,
        }
    }

    fn check_credentials(&self) -> Result<()> {
        if self.access_key_id.is_empty() {
            return Err(RequestError::new("Missing Escher access key id", 500));
        }
        if self.api_secret.is_empty() {
            return Err(RequestError::new("Missing Escher API secret", 500));
        }
        Ok(())
    }

    /// Signs at an explicit instant. `sign` delegates here with `Utc::now()`;
    /// tests use a fixed instant for reproducible signatures.
    fn sign_at(
        &self,
        request: &SignableRequest,
        payload: &str,
        headers_to_sign: &[String],
        now: DateTime<Utc>,
    ) -> Result<SignedRequest> {
        self.check_credentials()?;

        let long_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let short_date = now.format("%Y%m%d").to_string();

        let mut headers = request.headers.clone();
        set_header(&mut headers, &self.config.date_header_name, &long_date);

        let mut signed_names: Vec<String> = headers_to_sign
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .chain(std::iter::once(
                self.config.date_header_name.to_ascii_lowercase(),
            ))
            .collect();
        signed_names.sort_unstable();
        signed_names.dedup();
        let signed_headers = signed_names.join(";");

        let canonical_request =
            self.canonical_request(request, payload, &headers, &signed_names, &signed_headers)?;

        let string_to_sign = format!(
            "{algo}-HMAC-SHA256\n{long_date}\n{short_date}/{scope}\n{hash}",
            algo = self.config.algo_prefix,
            scope = self.config.credential_scope,
            hash = hex::encode(Sha256::digest(canonical_request.as_bytes())),
        );

        let signature = hex::encode(self.compute_signature(&short_date, &string_to_sign));

        let auth_value = format!(
            "{algo}-HMAC-SHA256 Credential={key}/{short_date}/{scope}, \
             SignedHeaders={signed_headers}, Signature={signature}",
            algo = self.config.algo_prefix,
            key = self.access_key_id,
            scope = self.config.credential_scope,
        );
        set_header(&mut headers, &self.config.auth_header_name, &auth_value);

        Ok(SignedRequest {
            request: SignableRequest {
                headers,
                body: payload.to_owned(),
                ..request.clone()
            },
        })
    }

    fn canonical_request(
        &self,
        request: &SignableRequest,
        payload: &str,
        headers: &[(String, String)],
        signed_names: &[String],
        signed_headers: &str,
    ) -> Result<String> {
        let (path, query) = match request.url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (request.url.as_str(), ""),
        };

        let mut header_lines = Vec::with_capacity(signed_names.len());
        for name in signed_names {
            let value = headers
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.trim())
                .ok_or_else(|| {
                    RequestError::new(format!("Header not found for signing: {name}"), 500)
                })?;
            header_lines.push(format!("{name}:{value}"));
        }

        Ok([
            request.method.as_str(),
            path,
            query,
            &header_lines.join("\n"),
            "",
            signed_headers,
            &hex::encode(Sha256::digest(payload.as_bytes())),
        ]
        .join("\n"))
    }

    /// Derives the signing key by chaining HMACs over the short date and each
    /// credential-scope segment, then signs the string-to-sign.
    fn compute_signature(&self, short_date: &str, string_to_sign: &str) -> Vec<u8> {
        let seed = format!(
            "{}{}",
            self.config.algo_prefix,
            self.api_secret.expose_secret()
        );
        let mut key = hmac_sha256(seed.as_bytes(), short_date.as_bytes());
        for segment in self.config.credential_scope.split('/') {
            key = hmac_sha256(&key, segment.as_bytes());
        }
        hmac_sha256(&key, string_to_sign.as_bytes())
    }
}

impl Signer for EscherSigner {
    fn sign(
        &self,
        request: &SignableRequest,
        payload: &str,
        headers_to_sign: &[String],
    ) -> Result<SignedRequest> {
        self.sign_at(request, payload, headers_to_sign, Utc::now())
    }
}

/// Replace-on-set matching the configuration header semantics.
fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
    headers.push((name.to_owned(), value.to_owned()));
}

/// Computes an HMAC-SHA256 digest.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length; new_from_slice cannot fail here
    let mut mac = HmacSha256::new_from_slice(key)
        .expect("HMAC-SHA256 accepts keys of any length; this is an infallible operation");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
