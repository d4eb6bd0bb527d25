//! Escher-signed HTTP client.
//!
//! Client library for calling Escher-protected (EMS-HMAC-SHA256) HTTP APIs.
//! Every request is signed with a keyed HMAC over a canonical representation
//! of the method, path, headers, and payload, then dispatched with timeout
//! control, optional retry, and a uniform error shape for every failure mode.
//!
//! # Features
//!
//! - **Signing**: Escher/EMS request signatures with a pluggable [`Signer`] seam
//! - **Uniform errors**: one [`RequestError`] shape for transport, HTTP, and
//!   decoding failures
//! - **Retry**: opaque [`RetryPolicy`] applied to recoverable failures only
//! - **Async**: built on tokio and reqwest
//!
//! # Example
//!
//! ```rust,no_run
//! use escher_request::{EscherClient, RequestConfig};
//!
//! # async fn example() -> escher_request::Result<()> {
//! let config = RequestConfig::create_for_internal_api("example.host.com", true);
//! let client = EscherClient::new("key-id", "api-secret", config)?;
//!
//! let response = client.get("/administrator/1").await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::return_self_not_must_use)]

// Re-exports of external dependencies
pub use serde;
pub use serde_json;

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod retry;
pub mod sender;
pub mod signer;

pub use client::EscherClient;
pub use config::{
    ConfigSnapshot, RequestConfig, RequestConfigOptions, DEFAULT_MAX_BODY_SIZE, DEFAULT_TIMEOUT_MS,
};
pub use credentials::SecretString;
pub use error::{RequestError, Result, RECOVERABLE_ERROR_CODES};
pub use retry::RetryPolicy;
pub use sender::{Sender, TransformedResponse};
pub use signer::{
    EscherConfig, EscherSigner, SignableRequest, SignedRequest, Signer, DEFAULT_CREDENTIAL_SCOPE,
};
// Re-export CancellationToken for convenient access
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```rust
/// use escher_request::prelude::*;
/// ```
pub mod prelude {
    pub use crate::client::EscherClient;
    pub use crate::config::{ConfigSnapshot, RequestConfig, RequestConfigOptions};
    pub use crate::error::{RequestError, Result};
    pub use crate::logging::{init_logging, try_init_logging, LogConfig, LogFormat, LogLevel};
    pub use crate::retry::RetryPolicy;
    pub use crate::sender::TransformedResponse;
    pub use crate::signer::{EscherConfig, EscherSigner, Signer};
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{json, Value};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
