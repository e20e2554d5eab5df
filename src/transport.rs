//! HTTP retrieval of the manifest document
//!
//! [`ManifestTransport`] is the seam between the resolver and the network.
//! [`HttpTransport`] performs a single blocking GET with a short timeout; it
//! never retries, the host's periodic check is the retry loop.

use crate::{Error, Result};
use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound on the request timeout; a stalled manifest host must not hold
/// an admin page load for longer than this
pub const MAX_TIMEOUT_SECONDS: u64 = 15;

/// Retrieve the raw manifest body from a URL
pub trait ManifestTransport {
    /// GET `url` and return the body of a 200 response
    ///
    /// Transport failures map to [`Error::Transport`], any other status to
    /// [`Error::HttpStatus`].
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(timeout_seconds: u64, user_agent: &str) -> Result<Self> {
        let timeout = Duration::from_secs(timeout_seconds.clamp(1, MAX_TIMEOUT_SECONDS));

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// User agent sent when none is configured
    pub fn default_user_agent() -> String {
        format!("globalblocks-updater/{}", env!("CARGO_PKG_VERSION"))
    }
}

impl ManifestTransport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Transport(format!("Manifest request timed out: {}", url))
                } else if e.is_connect() {
                    Error::Transport(format!("Cannot connect to manifest host: {}", e))
                } else {
                    Error::Transport(format!("Failed to fetch manifest: {}", e))
                }
            })?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Transport(format!("Failed to read manifest body: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
