use crate::models::{ListingDetails, Source, SummaryListing};
use crate::scrapers::FetchError;
use async_trait::async_trait;

/// One summary page of search results, plus the total listing count the
/// site reports so the caller knows when to stop paging.
#[derive(Debug, Clone)]
pub struct SummaryPage {
    pub listings: Vec<SummaryListing>,
    pub total_count: usize,
}

/// Common trait for all listing sources.
///
/// Implementations are HTML-specific; two variants exist with different
/// field completeness (direct-sale sites expose more detail attributes
/// than agency sites).
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Which source this adapter scrapes.
    fn source(&self) -> Source;

    /// Fetch one page of the paginated listing summary. Pages are 1-based.
    async fn fetch_summary_page(&self, page: u32) -> Result<SummaryPage, FetchError>;

    /// Fetch the detail page for a single listing url.
    async fn fetch_detail(&self, url: &str) -> Result<ListingDetails, FetchError>;
}
