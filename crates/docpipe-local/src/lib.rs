use docpipe_core::{Error, FetchBackend, FetchRequest, FetchResponse, Result};
use std::time::Duration;

pub mod aggregate;
pub mod extract;
pub mod filter;
pub mod search;

/// Page fetcher backed by a pooled reqwest client.
///
/// The client is safe to share across concurrent runs; each fetch is a single
/// attempt with no retry.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    client: reqwest::Client,
}

impl LocalFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("docpipe-local/0.1")
            .redirect(reqwest::redirect::Policy::limited(10))
            // Safety defaults: avoid "hang forever" on DNS/TLS/body stalls.
            // Per-request timeouts (FetchRequest.timeout_ms) can still override this.
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl FetchBackend for LocalFetcher {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse> {
        let url = url::Url::parse(&req.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let mut rb = self.client.get(url);
        if let Some(to) = req.timeout() {
            rb = rb.timeout(to);
        }
        let resp = rb.send().await.map_err(|e| Error::Fetch(e.to_string()))?;
        let final_url = resp.url().to_string();
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP status {status} for {final_url}")));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = req.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(
            url = %req.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            truncated,
            "fetched page"
        );

        Ok(FetchResponse {
            url: req.url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            bytes,
            truncated,
        })
    }
}
