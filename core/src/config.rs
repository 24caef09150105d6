//! Client configuration.

use std::time::Duration;

use crate::error::ClientError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for an `ApiClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every request path is appended to, without a trailing slash.
    pub base_url: String,

    pub connect_timeout: Duration,

    /// Budget for writing the request. reqwest has no per-write deadline, so
    /// this is added to `receive_timeout` to form the overall deadline of a
    /// non-download request (60s with the defaults).
    pub send_timeout: Duration,

    /// Upper bound between reads of the response.
    pub receive_timeout: Duration,

    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            connect_timeout: DEFAULT_TIMEOUT,
            send_timeout: DEFAULT_TIMEOUT,
            receive_timeout: DEFAULT_TIMEOUT,
            user_agent: format!("authclient/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Read `API_BASE_URL` and the optional `API_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var("API_BASE_URL")
            .map_err(|_| ClientError::Config("API_BASE_URL is not set".to_string()))?;
        let timeout = std::env::var("API_TIMEOUT_SECS").ok();
        Self::from_parts(&base_url, timeout.as_deref())
    }

    fn from_parts(base_url: &str, timeout_secs: Option<&str>) -> Result<Self, ClientError> {
        let config = Self::new(base_url);
        config.validate()?;
        match timeout_secs {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ClientError::Config(format!("API_TIMEOUT_SECS is not a number: {raw}"))
                })?;
                Ok(config.with_timeout(Duration::from_secs(secs)))
            }
            None => Ok(config),
        }
    }

    /// Apply the same timeout to the connect, send and receive phases.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_connect_timeout(timeout)
            .with_send_timeout(timeout)
            .with_receive_timeout(timeout)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Absolute URL for a request path.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.base_url.is_empty() {
            return Err(ClientError::Config("base URL is empty".to_string()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:3000")
    }
}
