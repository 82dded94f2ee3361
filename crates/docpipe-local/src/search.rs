use docpipe_core::{Candidate, Error, Result, SearchProvider, SearchQuery};
use serde::Deserialize;
use std::time::Duration;

/// Fixed number of organic results requested per search.
pub const SEARCH_RESULT_COUNT: usize = 2;

/// Request-level timeout for the single search call.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

fn serper_api_key_from_env() -> Option<String> {
    std::env::var("DOCPIPE_SERPER_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("SERPER_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn serper_endpoint_from_env() -> Option<String> {
    std::env::var("DOCPIPE_SERPER_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    timeout: Duration,
}

impl SerperSearchProvider {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: Self::endpoint(),
            timeout: SEARCH_TIMEOUT,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing DOCPIPE_SERPER_API_KEY (or SERPER_API_KEY)".to_string())
        })?;
        Ok(Self::new(client, api_key))
    }

    fn endpoint() -> String {
        // Docs: https://google.serper.dev/search
        serper_endpoint_from_env()
            .unwrap_or_else(|| "https://google.serper.dev/search".to_string())
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperOrganicResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganicResult {
    link: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>> {
        let body = serde_json::json!({
            "q": q.scoped,
            "num": SEARCH_RESULT_COUNT,
        });

        let sent = self
            .client
            .post(self.endpoint.as_str())
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await;
        let resp = match sent {
            Ok(r) => r,
            // Soft failure: a timed-out search behaves exactly like an empty
            // result set, keeping one "zero candidates" path for the caller.
            Err(e) if e.is_timeout() => {
                tracing::warn!(provider = "serper", "search timed out; zero candidates");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::Search(e.to_string())),
        };

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }

        let parsed: SerperSearchResponse = match resp.json().await {
            Ok(p) => p,
            Err(e) if e.is_timeout() => {
                tracing::warn!(provider = "serper", "search body timed out; zero candidates");
                return Ok(Vec::new());
            }
            Err(e) => return Err(Error::Search(e.to_string())),
        };

        let mut out = Vec::new();
        if let Some(results) = parsed.organic {
            for r in results {
                // Entries without a resolvable URL are not candidates.
                let Some(link) = r.link else { continue };
                out.push(Candidate {
                    url: link,
                    rank: out.len(),
                });
            }
        }
        tracing::debug!(provider = "serper", candidates = out.len(), "search complete");
        Ok(out)
    }
}
