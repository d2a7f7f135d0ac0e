use crate::error::{Result, ScanError};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: format!("sitelink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Single-shot HTTP GET. No retries; redirects follow reqwest's default policy.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|e| ScanError::Client(e.to_string()))?;

        Ok(Self::from_client(client))
    }

    pub(crate) fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Issues the GET and hands back the response with its body unread.
    ///
    /// Anything other than `200 OK` is an error; the rejected response is
    /// dropped here so its body never outlives the call.
    pub async fn fetch(&self, url: &str) -> Result<Response> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            drop(response);
            return Err(ScanError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}
