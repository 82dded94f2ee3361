use crate::{extract, filter};
use docpipe_core::{
    AggregationOutcome, Candidate, ExtractedDocument, FailureReason, FetchBackend, FetchRequest,
    Result, SearchProvider, SearchQuery, SourceRegistry,
};
use std::sync::Arc;
use tracing::debug;

/// Hard bound on collected pages per run.
pub const MAX_PAGES: usize = 3;

// Per-candidate fetch timeout.
const FETCH_TIMEOUT_MS: u64 = 30_000;

// Cap on raw page bytes; extraction truncates to characters afterwards.
const FETCH_MAX_BYTES: u64 = 2_000_000;

/// Drives search -> fetch -> extract -> filter across candidates, in rank
/// order, one attempt per candidate, stopping at [`MAX_PAGES`].
pub struct DocsPipeline {
    registry: SourceRegistry,
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn FetchBackend>,
}

impl DocsPipeline {
    pub fn new(
        registry: SourceRegistry,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn FetchBackend>,
    ) -> Self {
        Self {
            registry,
            search,
            fetcher,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// One full run. Input errors (unknown library) and search hard failures
    /// surface as `Err`; everything else folds into the outcome.
    pub async fn run(&self, query: &str, library: &str) -> Result<AggregationOutcome> {
        let source = self.registry.resolve(library)?;
        let q = SearchQuery::scoped_to(query, source);

        let candidates = self.search.search(&q).await?;
        if candidates.is_empty() {
            debug!(provider = self.search.name(), "no candidates; fetch phase skipped");
            return Ok(AggregationOutcome::Failed {
                reason: FailureReason::NoSearchResults,
                last_error: None,
            });
        }

        let mut chunks: Vec<ExtractedDocument> = Vec::new();
        let mut last_error: Option<String> = None;

        for candidate in &candidates {
            match self.try_candidate(candidate).await {
                Ok(Some(doc)) => {
                    chunks.push(doc);
                    if chunks.len() >= MAX_PAGES {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!(url = %candidate.url, error = %e, "candidate failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        if !chunks.is_empty() {
            return Ok(AggregationOutcome::Composed { chunks });
        }
        Ok(AggregationOutcome::Failed {
            reason: FailureReason::AllCandidatesUnusable,
            last_error,
        })
    }

    // One attempt for one candidate; Ok(None) is a silent quality skip.
    async fn try_candidate(&self, candidate: &Candidate) -> Result<Option<ExtractedDocument>> {
        let req = FetchRequest {
            url: candidate.url.clone(),
            timeout_ms: Some(FETCH_TIMEOUT_MS),
            max_bytes: Some(FETCH_MAX_BYTES),
        };
        let resp = self.fetcher.fetch(&req).await?;
        let text = extract::extract_main_text(&resp.text_lossy());

        if text.chars().count() < filter::MIN_USEFUL_CHARS {
            debug!(url = %candidate.url, "skipping too-short page");
            return Ok(None);
        }
        if filter::looks_like_bad_page(&text) {
            debug!(url = %candidate.url, "skipping blocked or redirect-stub page");
            return Ok(None);
        }

        Ok(Some(ExtractedDocument {
            source_url: candidate.url.clone(),
            text,
        }))
    }
}
