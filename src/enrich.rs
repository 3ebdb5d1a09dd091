//! Enrichment of newly appeared listings: detail fetch from the owning
//! source, then geocoding of the listing address.

use std::collections::HashMap;

use tracing::warn;

use crate::geocoding::GeocodingService;
use crate::models::{DiffRow, Geocode, ListingRecord, SummaryListing};
use crate::scrapers::{retry_fetch, SourceAdapter};

/// Enriched records plus the number of listings dropped on the way.
pub struct EnrichmentOutcome {
    pub records: Vec<ListingRecord>,
    pub skipped: usize,
}

/// Fetch detail attributes and geocode for each `new` diff row.
///
/// One listing failing its detail fetch is skipped and logged; it never
/// blocks the rest of the batch. A geocoding miss or error leaves the
/// geocode fields null and the listing proceeds.
pub async fn enrich_new_listings(
    adapter: &dyn SourceAdapter,
    geocoder: &dyn GeocodingService,
    new_rows: &[DiffRow],
    current: &HashMap<String, SummaryListing>,
) -> EnrichmentOutcome {
    let mut records = Vec::with_capacity(new_rows.len());
    let mut skipped = 0;

    for row in new_rows {
        let summary = match current.get(&row.url) {
            Some(summary) => summary.clone(),
            // Diff rows come from the current snapshot, so this only
            // happens if callers pass mismatched inputs.
            None => SummaryListing {
                url: row.url.clone(),
                price: row.price,
                address: None,
            },
        };

        let what = format!("{} detail {}", adapter.source().name(), row.url);
        let details = match retry_fetch(&what, || adapter.fetch_detail(&row.url)).await {
            Ok(details) => details,
            Err(err) => {
                warn!(url = %row.url, error = %err, "detail fetch failed, skipping listing");
                skipped += 1;
                continue;
            }
        };

        let geocode = match &summary.address {
            Some(address) => lookup_or_none(geocoder, address).await,
            None => None,
        };

        records.push(ListingRecord::assemble(&summary, details, geocode));
    }

    EnrichmentOutcome { records, skipped }
}

async fn lookup_or_none(geocoder: &dyn GeocodingService, address: &str) -> Option<Geocode> {
    match geocoder.lookup(address).await {
        Ok(geocode) => geocode,
        Err(err) => {
            warn!(%address, error = %err, "geocoding failed, keeping listing without location");
            None
        }
    }
}
