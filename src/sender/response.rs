use crate::error::{RequestError, Result};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};

/// A fully buffered response, before normalization.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// The uniform success shape returned to callers.
#[derive(Debug, Clone)]
pub struct TransformedResponse {
    /// Decoded body: a JSON value for JSON responses, a string otherwise.
    pub body: Value,
    /// HTTP status code.
    pub status_code: u16,
    /// Canonical status message (e.g. `OK`, `No Content`).
    pub status_message: String,
    /// Response headers, lowercased names.
    pub headers: HashMap<String, String>,
}

impl RawResponse {
    fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"))
    }

    fn status_message(&self) -> String {
        self.status.canonical_reason().unwrap_or_default().to_owned()
    }

    /// Decodes the body by content type. JSON bodies that fail to parse
    /// surface the parser message as a fatal error; anything else passes
    /// through as a string.
    fn decode_body(&self) -> Result<Value> {
        let text = String::from_utf8_lossy(&self.body).into_owned();
        if self.is_json() {
            serde_json::from_str(&text).map_err(|e| {
                error!(error = %e, "Failed to parse response body");
                RequestError::new(e.to_string(), 500)
            })
        } else {
            Ok(Value::String(text))
        }
    }

    /// Best-effort body decode used for error payloads: a JSON parse failure
    /// here degrades to the raw text instead of masking the HTTP error.
    fn decode_body_lossy(&self) -> Value {
        let text = String::from_utf8_lossy(&self.body).into_owned();
        if self.is_json() {
            if let Ok(value) = serde_json::from_str(&text) {
                return value;
            }
        }
        Value::String(text)
    }

    /// Maps a status of 400 or above to the uniform error, carrying the
    /// decoded body as the error data.
    pub(crate) fn check_status(self) -> Result<Self> {
        let code = self.status.as_u16();
        if code >= 400 {
            let data = self.decode_body_lossy();
            error!(status = code, "HTTP error response");
            return Err(RequestError::with_data(
                format!("Error in http response (status: {code})"),
                code,
                data,
            ));
        }
        Ok(self)
    }

    /// Normalizes a successful response into the caller-facing shape.
    ///
    /// An empty body is an error unless `allow_empty_response` is set, in
    /// which case the body decodes to the empty string.
    pub(crate) fn transform(self, allow_empty_response: bool) -> Result<TransformedResponse> {
        if self.body.is_empty() && !allow_empty_response {
            error!(status = self.status.as_u16(), "Empty http response");
            return Err(RequestError::with_data(
                "Empty http response",
                500,
                Value::String(self.status_message()),
            ));
        }

        let body = if self.body.is_empty() {
            Value::String(String::new())
        } else {
            self.decode_body()?
        };

        debug!(
            status = self.status.as_u16(),
            body_length = self.body.len(),
            "HTTP response received"
        );

        let headers = self
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();

        Ok(TransformedResponse {
            body,
            status_code: self.status.as_u16(),
            status_message: self.status_message(),
            headers,
        })
    }
}
