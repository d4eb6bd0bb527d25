use crate::error::{RequestError, Result};
use crate::signer::{SignableRequest, SignedRequest};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Response;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use super::builder::Sender;
use super::response::{RawResponse, TransformedResponse};

impl Sender {
    /// Sends a signed request and returns the normalized response.
    ///
    /// Dispatch and the status check run inside the retry loop when the
    /// request carries a retry policy; body normalization (empty-body and
    /// parse handling) happens once, on the final outcome.
    ///
    /// # Errors
    ///
    /// Returns the uniform error for transport failures, HTTP statuses of
    /// 400 and above, disallowed empty bodies, and malformed JSON bodies.
    #[instrument(name = "send", skip(self, signed), fields(host = %signed.request().host))]
    pub async fn send(
        &self,
        signed: SignedRequest,
        secure: bool,
    ) -> Result<TransformedResponse> {
        let started = std::time::Instant::now();
        let request = signed.into_inner();
        let scheme = if secure { "https" } else { "http" };
        let url = format!(
            "{scheme}://{host}:{port}{path}",
            host = request.host,
            port = request.port,
            path = request.url
        );
        let headers = build_header_map(&request.headers)?;
        let allow_empty_response = request.allow_empty_response;
        let policy = request.retry_policy.clone();

        let raw = self
            .execute_with_retry(policy.as_ref(), || {
                let url = url.clone();
                let headers = headers.clone();
                let request = &request;
                async move {
                    self.dispatch_once(request.method.clone(), &url, headers, request)
                        .await?
                        .check_status()
                }
            })
            .await?;

        let response = raw.transform(allow_empty_response)?;
        info!(
            status = response.status_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        Ok(response)
    }

    /// Runs one attempt under the per-request timeout.
    ///
    /// Each attempt gets a fresh cancellation token. When the timeout fires
    /// first, the token is cancelled while the attempt is still alive, the
    /// attempt observes it and drops the in-flight transfer, and the caller
    /// gets the recoverable timeout error.
    async fn dispatch_once(
        &self,
        method: reqwest::Method,
        url: &str,
        headers: HeaderMap,
        request: &SignableRequest,
    ) -> Result<RawResponse> {
        let cancel = CancellationToken::new();
        let timeout = Duration::from_millis(request.timeout);

        let mut builder = self.client().request(method, url).headers(headers);
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let attempt = async {
            tokio::select! {
                () = cancel.cancelled() => Err(RequestError::from_transport(
                    "Request aborted",
                    Some("ECONNABORTED"),
                )),
                outcome = async {
                    let response = builder.send().await.map_err(classify_transport_error)?;
                    self.read_body(response, request.max_body_size).await
                } => outcome,
            }
        };
        tokio::pin!(attempt);

        tokio::select! {
            outcome = &mut attempt => outcome,
            () = tokio::time::sleep(timeout) => {
                cancel.cancel();
                // the attempt sees the cancelled token and aborts the transfer
                let _ = attempt.as_mut().await;
                warn!(
                    url = %url,
                    timeout_ms = request.timeout,
                    "HTTP request timed out"
                );
                Err(RequestError::from_transport(
                    format!("timeout of {}ms exceeded", request.timeout),
                    Some("ETIMEDOUT"),
                ))
            }
        }
    }

    /// Buffers the response body, enforcing the size limit while streaming
    /// so an oversized body is abandoned as soon as the limit is crossed.
    async fn read_body(&self, response: Response, max_body_size: usize) -> Result<RawResponse> {
        let status = response.status();
        let headers = response.headers().clone();

        if let Some(content_length) = response.content_length() {
            if content_length > max_body_size as u64 {
                warn!(
                    content_length,
                    max_body_size, "Response exceeds size limit (Content-Length check)"
                );
                return Err(RequestError::new(
                    format!("Response size {content_length} bytes exceeds limit of {max_body_size} bytes"),
                    500,
                ));
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let initial_capacity = response
            .content_length()
            .map_or(64 * 1024, |len| std::cmp::min(len as usize, max_body_size));

        let mut stream = response.bytes_stream();
        let mut body = Vec::with_capacity(initial_capacity);

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                error!(error = %e, "Failed to read response chunk");
                classify_transport_error(e)
            })?;

            if body.len().saturating_add(chunk.len()) > max_body_size {
                warn!(max_body_size, "Response exceeds size limit during streaming");
                return Err(RequestError::new(
                    format!("Response size exceeds limit of {max_body_size} bytes"),
                    500,
                ));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

fn build_header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| RequestError::new(format!("Invalid header name {name:?}: {e}"), 500))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| RequestError::new(format!("Invalid header value for {name}: {e}"), 500))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Maps a transport failure onto the uniform error, preserving the socket
/// error name so the retry policy can tell recoverable failures apart.
fn classify_transport_error(error: reqwest::Error) -> RequestError {
    let original_code = if error.is_timeout() {
        Some("ETIMEDOUT")
    } else {
        io_error_kind(&error).and_then(|kind| match kind {
            std::io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
            std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::BrokenPipe => {
                Some("ECONNRESET")
            }
            std::io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
            std::io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
            _ => None,
        })
    };

    error!(error = %error, original_code = ?original_code, "HTTP request failed");
    RequestError::from_transport(error.to_string(), original_code)
}

/// Walks the error source chain looking for the underlying socket error.
fn io_error_kind(error: &(dyn std::error::Error + 'static)) -> Option<std::io::ErrorKind> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        source = err.source();
    }
    None
}
