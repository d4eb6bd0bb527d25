//! Error handling for escher-request.
//!
//! The whole crate reports failures through a single [`RequestError`] type,
//! whether the failure happened while signing, in the transport layer, in the
//! HTTP layer, or while decoding the response body. Callers can always read
//! `error.code` and `error.data` without matching on error kinds.
//!
//! # Classification
//!
//! - HTTP responses with status >= 400 carry the literal status in `code`.
//! - Recoverable transport failures (connection reset, timeout, connection
//!   refused, aborted) are mapped to `503` and keep the raw transport error
//!   code in `original_code`.
//! - Everything else (signing failures, parse failures, unknown transport
//!   errors, disallowed empty bodies) maps to `500`.
//!
//! # Example
//!
//! ```rust
//! use escher_request::RequestError;
//!
//! let err = RequestError::new("Empty http response", 500);
//! assert_eq!(err.code, 500);
//! assert_eq!(err.data["replyText"], "Empty http response");
//! ```

use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias for all escher-request operations.
pub type Result<T> = std::result::Result<T, RequestError>;

/// Transport error codes that are considered recoverable (retry-eligible).
///
/// These correspond to POSIX-style socket error names surfaced by the
/// transport layer. A failure carrying one of these codes is classified as
/// `503`; any other transport failure is a generic `500`.
pub const RECOVERABLE_ERROR_CODES: [&str; 4] =
    ["ECONNRESET", "ETIMEDOUT", "ECONNREFUSED", "ECONNABORTED"];

/// The uniform error type produced by every failure path in this crate.
///
/// `data` is always populated: it holds the parsed response body when one was
/// available, otherwise `{"replyText": <message>}` so callers can uniformly
/// read `error.data["replyText"]`.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RequestError {
    /// Human-readable failure description.
    pub message: String,
    /// HTTP status code when known, otherwise 500 (fatal) or 503 (recoverable).
    pub code: u16,
    /// Raw transport error code (e.g. `ECONNREFUSED`), preserved for diagnostics.
    pub original_code: Option<String>,
    /// Normalized failure payload, never `Value::Null`.
    pub data: Value,
}

impl RequestError {
    /// Creates an error with the default `{"replyText": message}` data payload.
    pub fn new(message: impl Into<String>, code: u16) -> Self {
        let message = message.into();
        let data = json!({ "replyText": message });
        Self {
            message,
            code,
            original_code: None,
            data,
        }
    }

    /// Creates an error carrying a response body as its data payload.
    ///
    /// `Value::Null` and the empty string fall back to the default
    /// `{"replyText": message}` shape, keeping the invariant that `data` is
    /// always readable.
    pub fn with_data(message: impl Into<String>, code: u16, data: Value) -> Self {
        let mut err = Self::new(message, code);
        match data {
            Value::Null => {}
            Value::String(s) if s.is_empty() => {}
            other => err.data = other,
        }
        err
    }

    /// Creates an error for a transport-level failure (no HTTP response).
    ///
    /// The original transport code is matched against
    /// [`RECOVERABLE_ERROR_CODES`] to decide between 503 and 500.
    pub fn from_transport(message: impl Into<String>, original_code: Option<&str>) -> Self {
        let code = match original_code {
            Some(c) if RECOVERABLE_ERROR_CODES.contains(&c) => 503,
            _ => 500,
        };
        let mut err = Self::new(message, code);
        err.original_code = original_code.map(str::to_owned);
        err
    }

    /// Convenience accessor for `data["replyText"]` when present.
    pub fn reply_text(&self) -> Option<&str> {
        self.data.get("replyText").and_then(Value::as_str)
    }
}
