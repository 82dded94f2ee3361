use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("Library {name} not supported. Supported libraries are: {}", .supported.join(", "))]
    UnsupportedSource { name: String, supported: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A named information domain queries can be scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    /// Site the search is scoped to via the `site:` operator.
    pub scope_url: String,
}

/// Immutable name -> source lookup, fixed at construction.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>) -> Self {
        Self { sources }
    }

    /// The built-in source set served by the stock `get_docs` tool.
    pub fn builtin() -> Self {
        let table = [
            (
                "wikipedia",
                "https://simple.wikipedia.org/wiki/Politics_of_the_United_States",
            ),
            ("associated-press", "https://apnews.com/politics"),
            ("nbc", "https://www.nbcnews.com/politics"),
        ];
        Self::new(
            table
                .iter()
                .map(|(name, url)| Source {
                    name: (*name).to_string(),
                    scope_url: (*url).to_string(),
                })
                .collect(),
        )
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    /// Pure lookup. An unknown name is caller misuse, not a retrievability
    /// problem, so it surfaces as a hard error listing every valid name.
    pub fn resolve(&self, name: &str) -> Result<&Source> {
        self.sources
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::UnsupportedSource {
                name: name.to_string(),
                supported: self.sources.iter().map(|s| s.name.clone()).collect(),
            })
    }
}

/// A query plus its site-scoped form. Constructed once per invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchQuery {
    pub raw: String,
    pub scoped: String,
}

impl SearchQuery {
    pub fn scoped_to(raw: &str, source: &Source) -> Self {
        Self {
            raw: raw.to_string(),
            scoped: format!("{raw} site:{}", source.scope_url),
        }
    }
}

/// A URL returned by the search provider, not yet fetched or validated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    /// Provider order (0-based). Meaningful; never reordered or deduped.
    pub rank: usize,
}

/// Normalized, already-truncated text recovered from one candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub source_url: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum FailureReason {
    NoSearchResults,
    AllCandidatesUnusable,
}

/// Prefix of every user-visible soft-failure string.
pub const FAILURE_PREFIX: &str = "DOCS_FETCH_FAILED:";

/// Literal separator between rendered chunks.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Final classification of one pipeline run.
///
/// Kept as a real sum type so "no results" vs "unusable results" stays
/// machine-checkable; callers flatten it with [`AggregationOutcome::render`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AggregationOutcome {
    Composed {
        chunks: Vec<ExtractedDocument>,
    },
    Failed {
        reason: FailureReason,
        /// Most recent fetch/parse error observed during the scan — "last",
        /// not "first" or "most relevant". None when every candidate was
        /// skipped by quality heuristics without erroring.
        last_error: Option<String>,
    },
}

impl AggregationOutcome {
    pub fn is_composed(&self) -> bool {
        matches!(self, Self::Composed { .. })
    }

    /// Flatten to the single-string contract consumed by calling agents.
    pub fn render(&self) -> String {
        match self {
            Self::Composed { chunks } => chunks
                .iter()
                .map(|c| format!("URL: {}\n\n{}", c.source_url, c.text))
                .collect::<Vec<_>>()
                .join(CHUNK_SEPARATOR),
            Self::Failed {
                reason: FailureReason::NoSearchResults,
                ..
            } => {
                format!("{FAILURE_PREFIX} no search results found for your query.")
            }
            Self::Failed {
                reason: FailureReason::AllCandidatesUnusable,
                last_error: Some(e),
            } => {
                format!(
                    "{FAILURE_PREFIX} tried multiple documentation URLs but all failed \
                     (last error: {e}). These sites may require JS/cookies or authentication."
                )
            }
            Self::Failed {
                reason: FailureReason::AllCandidatesUnusable,
                last_error: None,
            } => {
                format!(
                    "{FAILURE_PREFIX} tried multiple documentation URLs but they looked like \
                     redirect or JS-only pages with no usable content."
                )
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub url: String,
    /// Timeout for the whole operation (network + body read).
    pub timeout_ms: Option<u64>,
    /// Hard cap on bytes read from the response body.
    pub max_bytes: Option<u64>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_ms: None,
            max_bytes: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
    pub truncated: bool,
}

impl FetchResponse {
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).to_string()
    }
}

#[async_trait::async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, req: &FetchRequest) -> Result<FetchResponse>;
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    /// Candidates in provider order; entries without a resolvable URL are
    /// dropped by the implementation, not surfaced as errors.
    async fn search(&self, q: &SearchQuery) -> Result<Vec<Candidate>>;
}
