pub mod duproprio;
pub mod royallepage;
pub mod traits;

pub use duproprio::DuProprioAdapter;
pub use royallepage::RoyalLepageAdapter;
pub use traits::{SourceAdapter, SummaryPage};

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::SummaryListing;

/// Errors from a single fetch/parse of an external page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(reqwest::StatusCode),
    #[error("page structure not recognized: {0}")]
    Parse(String),
}

const FETCH_ATTEMPTS: u32 = 3;
const FETCH_BASE_DELAY: Duration = Duration::from_millis(500);

/// Retry a fetch with exponential backoff. Transient network failures get
/// `FETCH_ATTEMPTS` tries before the error is surfaced to the caller.
pub async fn retry_fetch<F, Fut, T>(what: &str, mut op: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut delay = FETCH_BASE_DELAY;
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < FETCH_ATTEMPTS => {
                warn!(%what, attempt, error = %err, "fetch failed, retrying");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(err) => {
                warn!(%what, attempt, error = %err, "fetch failed, retries exhausted");
                return Err(err);
            }
        }
    }
}

// Sites occasionally misreport their total count; cap the walk so a bad
// number cannot page forever.
const MAX_SUMMARY_PAGES: u32 = 200;

/// Walk a source's summary pages until the reported total count is reached.
///
/// Anything short of the full snapshot aborts this source: a page that
/// still fails after retries, or a walk that runs out of pages before the
/// reported total. A truncated snapshot would make every unfetched listing
/// look sold.
pub async fn fetch_all_summaries(
    adapter: &dyn SourceAdapter,
) -> Result<Vec<SummaryListing>, FetchError> {
    let mut listings: Vec<SummaryListing> = Vec::new();
    let mut page: u32 = 1;

    loop {
        let what = format!("{} summary page {}", adapter.source().name(), page);
        let result = retry_fetch(&what, || adapter.fetch_summary_page(page)).await?;

        debug!(
            source = adapter.source().name(),
            page,
            fetched = result.listings.len(),
            total = result.total_count,
            "summary page fetched"
        );

        let exhausted = result.listings.is_empty() || page >= MAX_SUMMARY_PAGES;
        listings.extend(result.listings);

        if listings.len() >= result.total_count {
            break;
        }
        if exhausted {
            return Err(FetchError::Parse(format!(
                "summary walk ended at {} of {} listings",
                listings.len(),
                result.total_count
            )));
        }
        page += 1;
    }

    Ok(listings)
}

/// Parse a site-formatted price like `"500 000 $"` into an integer amount.
pub(crate) fn parse_price(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Visible text of an element with whitespace collapsed.
pub(crate) fn text_of(el: scraper::ElementRef) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip area text down to its numeric part, e.g. `"1 200 pi²"` -> `"1200"`.
pub(crate) fn strip_units(text: &str) -> Option<String> {
    let numeric: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if numeric.is_empty() {
        None
    } else {
        Some(numeric)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListingDetails, Source};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn price_parsing_strips_spaces_and_currency() {
        assert_eq!(parse_price("500 000 $"), Some(500_000));
        assert_eq!(parse_price("1 234 567$"), Some(1_234_567));
        assert_eq!(parse_price("prix sur demande"), None);
    }

    #[test]
    fn unit_stripping_keeps_digits_and_dot() {
        assert_eq!(strip_units("1 200 pi²").as_deref(), Some("1200"));
        assert_eq!(strip_units("85.5 m²").as_deref(), Some("85.5"));
        assert_eq!(strip_units("n/d"), None);
    }

    struct PagedAdapter {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SourceAdapter for PagedAdapter {
        fn source(&self) -> Source {
            Source::DuProprio
        }

        async fn fetch_summary_page(&self, page: u32) -> Result<SummaryPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // 5 listings total, 2 per page.
            let urls: Vec<u32> = match page {
                1 => vec![1, 2],
                2 => vec![3, 4],
                3 => vec![5],
                _ => vec![],
            };
            Ok(SummaryPage {
                listings: urls
                    .into_iter()
                    .map(|n| SummaryListing {
                        url: format!("https://duproprio.com/{n}"),
                        price: Some(100_000 * n as i64),
                        address: None,
                    })
                    .collect(),
                total_count: 5,
            })
        }

        async fn fetch_detail(&self, _url: &str) -> Result<ListingDetails, FetchError> {
            Ok(ListingDetails::default())
        }
    }

    #[tokio::test]
    async fn summary_walk_stops_at_reported_total() {
        let adapter = PagedAdapter {
            calls: AtomicU32::new(0),
        };
        let listings = fetch_all_summaries(&adapter).await.unwrap();
        assert_eq!(listings.len(), 5);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    }

    struct TruncatedAdapter;

    #[async_trait]
    impl SourceAdapter for TruncatedAdapter {
        fn source(&self) -> Source {
            Source::DuProprio
        }

        async fn fetch_summary_page(&self, page: u32) -> Result<SummaryPage, FetchError> {
            // Claims 4 listings but page 2 comes back empty.
            let listings = if page == 1 {
                vec![
                    SummaryListing {
                        url: "https://duproprio.com/1".into(),
                        price: Some(100_000),
                        address: None,
                    },
                    SummaryListing {
                        url: "https://duproprio.com/2".into(),
                        price: Some(200_000),
                        address: None,
                    },
                ]
            } else {
                vec![]
            };
            Ok(SummaryPage {
                listings,
                total_count: 4,
            })
        }

        async fn fetch_detail(&self, _url: &str) -> Result<ListingDetails, FetchError> {
            Ok(ListingDetails::default())
        }
    }

    #[tokio::test]
    async fn summary_walk_fails_when_pages_run_out_early() {
        let err = fetch_all_summaries(&TruncatedAdapter).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
        assert!(err.to_string().contains("2 of 4"));
    }

    struct EmptySource;

    #[async_trait]
    impl SourceAdapter for EmptySource {
        fn source(&self) -> Source {
            Source::RoyalLepage
        }

        async fn fetch_summary_page(&self, _page: u32) -> Result<SummaryPage, FetchError> {
            Ok(SummaryPage {
                listings: vec![],
                total_count: 0,
            })
        }

        async fn fetch_detail(&self, _url: &str) -> Result<ListingDetails, FetchError> {
            Ok(ListingDetails::default())
        }
    }

    #[tokio::test]
    async fn summary_walk_accepts_a_genuinely_empty_source() {
        let listings = fetch_all_summaries(&EmptySource).await.unwrap();
        assert!(listings.is_empty());
    }

    struct FlakyAdapter {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SourceAdapter for FlakyAdapter {
        fn source(&self) -> Source {
            Source::RoyalLepage
        }

        async fn fetch_summary_page(&self, _page: u32) -> Result<SummaryPage, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(FetchError::Parse("transient".into()))
            } else {
                Ok(SummaryPage {
                    listings: vec![SummaryListing {
                        url: "https://www.royallepage.ca/1".into(),
                        price: Some(1),
                        address: None,
                    }],
                    total_count: 1,
                })
            }
        }

        async fn fetch_detail(&self, _url: &str) -> Result<ListingDetails, FetchError> {
            Ok(ListingDetails::default())
        }
    }

    #[tokio::test]
    async fn summary_fetch_retries_transient_failures() {
        let adapter = FlakyAdapter {
            calls: AtomicU32::new(0),
        };
        let listings = fetch_all_summaries(&adapter).await.unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 3);
    }
}
