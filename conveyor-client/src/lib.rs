//! Conveyor HTTP Client
//!
//! Talks to the pipeline server over its JSON API and holds the application
//! state a front end works against.
//!
//! - [`ConveyorClient`] is the reqwest-backed [`Transport`]
//! - [`PipelineApi`] adds typed endpoint methods to any transport
//! - [`Session`] ties requests, the editor and notifications together
//!
//! # Example
//!
//! ```no_run
//! use conveyor_client::{ConveyorClient, PipelineApi};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ConveyorClient::new("http://localhost:8080");
//!
//!     for pipeline in client.list_pipelines().await? {
//!         println!("{} ({})", pipeline.name, pipeline.status);
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod pipelines;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use pipelines::PipelineApi;
pub use session::{Editor, EditorMode, Session};
pub use transport::{Envelope, Transport};

use reqwest::Client;
use std::time::Duration;

/// HTTP client for the pipeline server API
#[derive(Debug, Clone)]
pub struct ConveyorClient {
    /// Base URL of the server (e.g., "http://localhost:8080")
    base_url: String,
    /// HTTP client instance
    client: Client,
}

impl ConveyorClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "http://localhost:8080")
    ///
    /// # Example
    /// ```
    /// use conveyor_client::ConveyorClient;
    ///
    /// let client = ConveyorClient::new("http://localhost:8080");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc.
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Create a new client whose requests time out after `timeout`
    ///
    /// # Example
    /// ```
    /// use conveyor_client::ConveyorClient;
    /// use std::time::Duration;
    ///
    /// let client = ConveyorClient::with_timeout("http://localhost:8080", Duration::from_secs(30))?;
    /// # Ok::<(), conveyor_client::ClientError>(())
    /// ```
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, client))
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = ConveyorClient::new("http://localhost:8080");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = ConveyorClient::new("http://localhost:8080//");
        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_client_with_timeout() {
        let client =
            ConveyorClient::with_timeout("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
