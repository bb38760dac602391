use async_trait::async_trait;
use thiserror::Error;

/// Raw transport errors, below the `IssError` taxonomy.
///
/// `IssClient` maps these onto `IssError` once it knows which operation was in flight
/// (a bare transport timeout doesn't know if it should become `DateRangeTooLarge` vs.
/// `Timeout`, for instance).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("server error: {status}")]
    Server { status: u16 },
    #[error("client error: {status}")]
    Client { status: u16 },
    #[error("transport error: {0}")]
    Other(String),
}

/// Abstracts the HTTP fetch of one MOEX ISS JSON path.
///
/// Mirrors how the upstream codebase isolates its external market-data fetch behind a
/// trait (`PriceProvider`) so production code can use a real HTTP client while tests
/// supply canned responses without a network.
#[async_trait]
pub trait IssTransport: Send + Sync {
    /// Fetch the JSON body at `path` (relative to the configured ISS base URL) with the
    /// given query parameters. Implementations own retry/backoff and timeout handling.
    async fn fetch_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, TransportError>;
}

pub struct HttpIssTransport {
    client: reqwest::Client,
    base_url: url::Url,
    timeout: std::time::Duration,
    max_retries: u32,
}

impl HttpIssTransport {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self, url::ParseError> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("risk-analytics/0.1")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: url::Url::parse(base_url)?,
            timeout,
            max_retries: 3,
        })
    }

    async fn fetch_once(
        &self,
        url: url::Url,
    ) -> Result<serde_json::Value, TransportError> {
        let resp = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() {
            return Err(TransportError::Server { status: status.as_u16() });
        }
        if status.is_client_error() {
            return Err(TransportError::Client { status: status.as_u16() });
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Other(e.to_string()))
    }
}

#[async_trait]
impl IssTransport for HttpIssTransport {
    async fn fetch_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, TransportError> {
        let mut url = self.base_url.join(path).map_err(|e| TransportError::Other(e.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(url.clone()).await {
                Ok(v) => return Ok(v),
                Err(TransportError::Server { status }) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = std::time::Duration::from_millis(100 * 2u64.pow(attempt));
                    tracing::warn!(status, attempt, "ISS server error, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(TransportError::Other(_)) if attempt < self.max_retries => {
                    attempt += 1;
                    let backoff = std::time::Duration::from_millis(100 * 2u64.pow(attempt));
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
