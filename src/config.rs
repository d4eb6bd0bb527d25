//! Request configuration.
//!
//! [`RequestConfig`] holds connection and header defaults for one logical
//! destination (target service + environment). It is constructed once,
//! mutated through explicit setters at setup time, and read on every call via
//! [`RequestConfig::to_hash`], which returns an independent snapshot so
//! concurrent calls never observe partial mutation.
//!
//! Headers are stored as an ordered sequence of `(name, value)` pairs rather
//! than a map: insertion order feeds the signer's canonical string, and the
//! replace-on-set behavior guarantees at most one entry per name.

use crate::retry::RetryPolicy;
use serde::Serialize;

const MEGA_BYTE: usize = 1024 * 1024;

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Default maximum response body size in bytes (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * MEGA_BYTE;

/// Optional construction-time overrides for [`RequestConfig`].
///
/// Every field defaults to the built-in value when `None`; recognized keys
/// override defaults, making it a forward-compatible merge over the config's
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestConfigOptions {
    /// Use HTTPS when true (default: true).
    pub secure: Option<bool>,
    /// Target port (default: 443).
    pub port: Option<u16>,
    /// Verify TLS certificates (default: true).
    pub reject_unauthorized: Option<bool>,
    /// Replaces the default header list wholesale when provided.
    pub headers: Option<Vec<(String, String)>>,
    /// Path prefix prepended to every call.
    pub prefix: Option<String>,
    /// Request timeout in milliseconds (default: 15000).
    pub timeout: Option<u64>,
    /// Tolerate empty response bodies (default: false).
    pub allow_empty_response: Option<bool>,
    /// Maximum response body size in bytes (default: 10 MB).
    pub max_body_size: Option<usize>,
    /// Reuse connections across calls (default: false).
    pub keep_alive: Option<bool>,
    /// Signing namespace; falls back to the Escher default scope when unset.
    pub credential_scope: Option<String>,
    /// Transport retry policy, passed through opaquely.
    pub retry_policy: Option<RetryPolicy>,
}

/// Connection and header defaults for one logical destination.
#[derive(Debug, Clone)]
pub struct RequestConfig {
    secure: bool,
    port: u16,
    host: String,
    reject_unauthorized: bool,
    headers: Vec<(String, String)>,
    prefix: String,
    timeout: u64,
    allow_empty_response: bool,
    max_body_size: usize,
    keep_alive: bool,
    credential_scope: Option<String>,
    retry_policy: Option<RetryPolicy>,
}

/// Normalized per-call snapshot produced by [`RequestConfig::to_hash`].
///
/// Headers are a copy; mutating the snapshot never affects the configuration.
/// When serialized, `rejectUnauthorized` appears only when false and
/// `allowEmptyResponse` only when true, so the dangerous/unusual settings are
/// visible exactly when they deviate from the safe defaults.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSnapshot {
    /// Target port.
    pub port: u16,
    /// Target host.
    pub host: String,
    /// Copied header pairs, insertion order preserved.
    pub headers: Vec<(String, String)>,
    /// Path prefix prepended to every call.
    pub prefix: String,
    /// Request timeout in milliseconds.
    pub timeout: u64,
    /// Maximum response body size in bytes.
    pub max_body_size: usize,
    /// TLS verification toggle, serialized only when disabled.
    #[serde(skip_serializing_if = "is_true")]
    pub reject_unauthorized: bool,
    /// Empty-body tolerance, serialized only when enabled.
    #[serde(skip_serializing_if = "is_false")]
    pub allow_empty_response: bool,
    /// Transport retry policy, if configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_true(value: &bool) -> bool {
    *value
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

impl RequestConfig {
    /// Creates a configuration for `host` with optional overrides.
    ///
    /// Default headers are `content-type: application/json` and `host`.
    pub fn new(host: impl Into<String>, options: RequestConfigOptions) -> Self {
        let host = host.into();
        let headers = options.headers.unwrap_or_else(|| {
            vec![
                ("content-type".to_owned(), "application/json".to_owned()),
                ("host".to_owned(), host.clone()),
            ]
        });

        Self {
            secure: options.secure.unwrap_or(true),
            port: options.port.unwrap_or(443),
            host,
            reject_unauthorized: options.reject_unauthorized.unwrap_or(true),
            headers,
            prefix: options.prefix.unwrap_or_default(),
            timeout: options.timeout.unwrap_or(DEFAULT_TIMEOUT_MS),
            allow_empty_response: options.allow_empty_response.unwrap_or(false),
            max_body_size: options.max_body_size.unwrap_or(DEFAULT_MAX_BODY_SIZE),
            keep_alive: options.keep_alive.unwrap_or(false),
            credential_scope: options.credential_scope,
            retry_policy: options.retry_policy,
        }
    }

    /// Creates a secure configuration with an explicit path prefix.
    pub fn create(
        host: impl Into<String>,
        prefix: impl Into<String>,
        reject_unauthorized: bool,
    ) -> Self {
        Self::new(
            host,
            RequestConfigOptions {
                prefix: Some(prefix.into()),
                reject_unauthorized: Some(reject_unauthorized),
                ..RequestConfigOptions::default()
            },
        )
    }

    /// Creates a configuration for the internal API (`/api/v2/internal`).
    pub fn create_for_internal_api(host: impl Into<String>, reject_unauthorized: bool) -> Self {
        Self::create(host, "/api/v2/internal", reject_unauthorized)
    }

    /// Creates a configuration for the service API (`/api/services`).
    pub fn create_for_service_api(host: impl Into<String>, reject_unauthorized: bool) -> Self {
        Self::create(host, "/api/services", reject_unauthorized)
    }

    /// Sets a header, replacing any existing entry with the same name.
    ///
    /// Replacement matches the stored name case-sensitively; the new pair is
    /// appended at the end, so a replaced header moves to the end of the list
    /// while the order of the others is preserved.
    pub fn set_header(&mut self, header: (impl Into<String>, impl Into<String>)) {
        let (name, value) = (header.0.into(), header.1.into());
        self.headers.retain(|(existing, _)| *existing != name);
        self.headers.push((name, value));
    }

    /// Looks up a header value by case-insensitive name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Switches to HTTPS on the given port (443 when `None`).
    pub fn set_to_secure(&mut self, port: Option<u16>, reject_unauthorized: bool) {
        self.port = port.unwrap_or(443);
        self.secure = true;
        self.reject_unauthorized = reject_unauthorized;
    }

    /// Switches to plain HTTP on the given port (80 when `None`).
    pub fn set_to_unsecure(&mut self, port: Option<u16>) {
        self.port = port.unwrap_or(80);
        self.secure = false;
    }

    /// Sets the target host.
    pub fn set_host(&mut self, host: impl Into<String>) {
        self.host = host.into();
    }

    /// Sets the target port.
    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    /// Sets the request timeout in milliseconds.
    pub fn set_timeout(&mut self, timeout: u64) {
        self.timeout = timeout;
    }

    /// Returns the request timeout in milliseconds.
    pub fn get_timeout(&self) -> u64 {
        self.timeout
    }

    /// Whether the configuration targets HTTPS.
    pub fn secure(&self) -> bool {
        self.secure
    }

    /// Target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether TLS certificates are verified.
    pub fn reject_unauthorized(&self) -> bool {
        self.reject_unauthorized
    }

    /// Whether connections are reused across calls.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Signing namespace override, if any.
    pub fn credential_scope(&self) -> Option<&str> {
        self.credential_scope.as_deref()
    }

    /// Merges option overrides into this configuration.
    ///
    /// Only fields set to `Some` are applied; everything else keeps its
    /// current value.
    pub fn apply_options(&mut self, options: RequestConfigOptions) {
        if let Some(secure) = options.secure {
            self.secure = secure;
        }
        if let Some(port) = options.port {
            self.port = port;
        }
        if let Some(reject_unauthorized) = options.reject_unauthorized {
            self.reject_unauthorized = reject_unauthorized;
        }
        if let Some(headers) = options.headers {
            self.headers = headers;
        }
        if let Some(prefix) = options.prefix {
            self.prefix = prefix;
        }
        if let Some(timeout) = options.timeout {
            self.timeout = timeout;
        }
        if let Some(allow_empty_response) = options.allow_empty_response {
            self.allow_empty_response = allow_empty_response;
        }
        if let Some(max_body_size) = options.max_body_size {
            self.max_body_size = max_body_size;
        }
        if let Some(keep_alive) = options.keep_alive {
            self.keep_alive = keep_alive;
        }
        if let Some(credential_scope) = options.credential_scope {
            self.credential_scope = Some(credential_scope);
        }
        if let Some(retry_policy) = options.retry_policy {
            self.retry_policy = Some(retry_policy);
        }
    }

    /// Produces an independent per-call snapshot of this configuration.
    pub fn to_hash(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            port: self.port,
            host: self.host.clone(),
            headers: self.headers.clone(),
            prefix: self.prefix.clone(),
            timeout: self.timeout,
            max_body_size: self.max_body_size,
            reject_unauthorized: self.reject_unauthorized,
            allow_empty_response: self.allow_empty_response,
            retry_policy: self.retry_policy.clone(),
        }
    }
}
