use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::warn;

use pw_core::{DateRange, Paper, Result, TopicQuery};

pub mod arxiv;
pub mod medrxiv;

pub use arxiv::ArxivSource;
pub use medrxiv::MedrxivSource;

/// One provider result page plus the opaque cursor for the next one.
/// `next == None` means the provider reported no more data.
#[derive(Debug)]
pub struct SourcePage {
    pub papers: Vec<Paper>,
    pub next: Option<usize>,
}

pub const MAX_FETCH_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// An external paper-search provider. Implementations own their wire
/// format and paging mechanics; callers only see pages and papers.
#[async_trait]
pub trait PaperSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether several topics can be folded into one boolean-OR request.
    fn supports_combined_query(&self) -> bool {
        false
    }

    fn page_size(&self) -> usize {
        50
    }

    /// Build the provider query string for a set of topics.
    fn build_query(&self, topics: &[TopicQuery]) -> String;

    /// Fetch one result page; a single network round trip.
    async fn fetch_page(
        &self,
        query: &str,
        range: &DateRange,
        cursor: usize,
        page_size: usize,
    ) -> Result<SourcePage>;

    /// Single-record lookup by any accepted identifier form.
    /// `Ok(None)` is "not found", which is not an error.
    async fn get_by_id(&self, raw_id: &str) -> Result<Option<Paper>>;

    /// Page through the provider until `limit` records are collected or
    /// the provider runs out. A page failure after retries keeps the
    /// partial set when earlier pages already succeeded; a first-page
    /// failure propagates so the caller can record the query as failed.
    async fn search(
        &self,
        topics: &[TopicQuery],
        range: &DateRange,
        limit: usize,
    ) -> Result<Vec<Paper>> {
        let query = self.build_query(topics);
        let mut collected: Vec<Paper> = Vec::new();
        let mut cursor = Some(0usize);

        while let Some(start) = cursor {
            if collected.len() >= limit {
                break;
            }
            let page_size = self.page_size().min(limit - collected.len());
            let page = match fetch_page_with_retry(self, &query, range, start, page_size).await {
                Ok(page) => page,
                Err(e) if collected.is_empty() => return Err(e),
                Err(e) => {
                    warn!(
                        "⚠️ {}: page fetch failed, keeping {} papers already collected: {}",
                        self.name(),
                        collected.len(),
                        e
                    );
                    break;
                }
            };
            cursor = page.next;
            collected.extend(page.papers);
        }

        collected.truncate(limit);
        Ok(collected)
    }
}

async fn fetch_page_with_retry<S: PaperSource + ?Sized>(
    source: &S,
    query: &str,
    range: &DateRange,
    cursor: usize,
    page_size: usize,
) -> Result<SourcePage> {
    let mut attempt = 1;
    loop {
        match source.fetch_page(query, range, cursor, page_size).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_transient() && attempt < MAX_FETCH_ATTEMPTS => {
                warn!(
                    "{}: transient fetch failure (attempt {}/{}): {}",
                    source.name(),
                    attempt,
                    MAX_FETCH_ATTEMPTS,
                    e
                );
                sleep(RETRY_BASE_DELAY * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
