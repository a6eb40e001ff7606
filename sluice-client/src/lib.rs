//! Sluice HTTP Clients
//!
//! Type-safe HTTP clients used by the sluice worker and CLI:
//! - [`ControlPlaneClient`]: the remote control plane that owns pipelines and
//!   steps (pipeline creation, step updates, heartbeats)
//! - [`WorkerClient`]: the local worker service (start a step, status, health)
//!
//! # Example
//!
//! ```no_run
//! use sluice_client::ControlPlaneClient;
//! use sluice_core::dto::pipeline::CreatePipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ControlPlaneClient::new("http://localhost:8000");
//!
//!     let created = client.create_pipeline(&CreatePipeline {
//!         h5_img_name: "sample.pyramid.h5".to_string(),
//!         uploader: "sluice".to_string(),
//!         notification_emails: vec![],
//!         wait_for_image_upload: false,
//!     }).await?;
//!
//!     println!("Created pipeline: {}", created.pipeline_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;
mod steps;
mod worker;
mod workers;

pub use error::{ClientError, Result};
pub use worker::WorkerClient;

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// HTTP client for the control-plane API
///
/// Cloning is cheap and clones share the same connection pool and the same
/// closed flag: once any clone calls [`close`](Self::close), every clone
/// refuses further requests with [`ClientError::Closed`].
#[derive(Debug, Clone)]
pub struct ControlPlaneClient {
    /// Base URL of the control plane (e.g., "http://localhost:8000")
    base_url: String,
    /// HTTP client instance
    client: Client,
    closed: Arc<AtomicBool>,
}

impl ControlPlaneClient {
    /// Create a new control-plane client
    ///
    /// # Example
    /// ```
    /// use sluice_client::ControlPlaneClient;
    ///
    /// let client = ControlPlaneClient::new("http://localhost:8000");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the base URL of the control plane
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Permanently closes the transport for this client and all its clones
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Control-plane client closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }
        Ok(())
    }
}

// =============================================================================
// Response Handlers
// =============================================================================

/// Check the status code and deserialize the JSON body of a response
pub(crate) async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
}

/// Check the status code of a response whose body is not needed
pub(crate) async fn handle_empty_response(response: reqwest::Response) -> Result<()> {
    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(ClientError::api_error(status.as_u16(), error_text));
    }

    Ok(())
}
