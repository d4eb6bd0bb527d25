//! Transport layer.
//!
//! The sender owns the connection-pooled HTTP client and turns a signed
//! request into a transformed response:
//!
//! - per-attempt timeout and cancellation
//! - transport error classification (recoverable vs fatal)
//! - response body size limit enforced while streaming
//! - retry of recoverable failures when the request carries a retry policy
//! - normalization of empty and malformed bodies into the uniform error type
//!
//! Retry wraps dispatch and the status check only. A response that arrives
//! with a success status but an unusable body (empty where not allowed, or
//! unparseable) is a terminal failure and is never retried.

mod builder;
mod request;
mod response;
mod retry;

pub use builder::Sender;
pub use response::TransformedResponse;
