//! Snapshot reconciliation: classify every listing as new, sold or
//! price-changed by joining the current scrape against the stored state.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::models::{DiffAction, DiffRow, ListingRecord, Source, SummaryListing};

/// Drop repeated urls from the concatenated multi-source snapshot, keeping
/// the first occurrence. A url served by more than one source would
/// otherwise be classified twice.
pub fn dedup_by_url(current: Vec<SummaryListing>) -> Vec<SummaryListing> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(current.len());
    for listing in current {
        if seen.insert(listing.url.clone()) {
            out.push(listing);
        } else {
            warn!(url = %listing.url, "duplicate url in current snapshot, keeping first occurrence");
        }
    }
    out
}

/// Full outer join of current vs. stored snapshot on url, classified:
///
/// - url only in current: `New` (regardless of price, which may be null)
/// - url only in stored: `Sold`
/// - url in both with differing prices: `PriceChange`
/// - url in both with equal prices (including both null): no event
pub fn diff_snapshots(current: &[SummaryListing], stored: &[ListingRecord]) -> Vec<DiffRow> {
    let stored_prices: HashMap<&str, Option<i64>> = stored
        .iter()
        .map(|r| (r.url.as_str(), r.price))
        .collect();
    let current_urls: HashSet<&str> = current.iter().map(|l| l.url.as_str()).collect();

    let mut rows = Vec::new();

    for listing in current {
        match stored_prices.get(listing.url.as_str()) {
            None => rows.push(DiffRow {
                url: listing.url.clone(),
                price: listing.price,
                action: DiffAction::New,
            }),
            Some(price_old) if *price_old != listing.price => rows.push(DiffRow {
                url: listing.url.clone(),
                price: listing.price,
                action: DiffAction::PriceChange,
            }),
            Some(_) => {}
        }
    }

    for record in stored {
        if !current_urls.contains(record.url.as_str()) {
            rows.push(DiffRow {
                url: record.url.clone(),
                price: None,
                action: DiffAction::Sold,
            });
        }
    }

    rows
}

/// Split diff rows by originating source so detail fetches can be routed to
/// the matching adapter.
pub fn partition_by_source(rows: Vec<DiffRow>) -> HashMap<Source, Vec<DiffRow>> {
    let mut by_source: HashMap<Source, Vec<DiffRow>> = HashMap::new();
    for row in rows {
        by_source.entry(Source::of_url(&row.url)).or_default().push(row);
    }
    by_source
}
