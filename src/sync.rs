//! One sync run: scrape every source, diff against the stored snapshot,
//! enrich what is new, and apply the transitions to both stores.

use std::collections::HashMap;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::diff::{dedup_by_url, diff_snapshots, partition_by_source};
use crate::enrich::enrich_new_listings;
use crate::geocoding::GeocodingService;
use crate::models::{DiffAction, DiffRow, ListingRecord, Source, SummaryListing, WarehouseEntry};
use crate::scrapers::{fetch_all_summaries, SourceAdapter};
use crate::store::{OperationalBatch, OperationalStore, WarehouseStore};

/// Counts of applied transitions for one source.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SourceStats {
    pub new: usize,
    pub price_changed: usize,
    pub sold: usize,
    /// New listings dropped because their detail fetch failed.
    pub skipped: usize,
}

/// Per-source outcome of a run, the primary observable of the batch.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub per_source: HashMap<Source, SourceStats>,
}

impl SyncReport {
    fn stats_mut(&mut self, source: Source) -> &mut SourceStats {
        self.per_source.entry(source).or_default()
    }
}

/// Run the full pipeline once.
///
/// Fails only when every source fails to scrape or a store is unreachable;
/// single-source and single-listing failures are logged and survived. The
/// warehouse commits before the operational store, so a crash between the
/// two re-derives the same transitions next run (duplicate history rows
/// are possible under crash-retry; lost history is not), and re-applying
/// operational mutations is a no-op.
pub async fn run_sync(
    adapters: &[&dyn SourceAdapter],
    geocoder: &dyn GeocodingService,
    operational: &OperationalStore,
    warehouse: &WarehouseStore,
) -> Result<SyncReport> {
    let stored = operational.read_all_listings().await?;

    // Scrape every source. A source whose summary walk fails is excluded
    // from the run entirely: diffing its stored listings against an absent
    // snapshot would mark them all sold.
    let mut current: Vec<SummaryListing> = Vec::new();
    let mut failed_sources: Vec<Source> = Vec::new();
    for adapter in adapters {
        match fetch_all_summaries(*adapter).await {
            Ok(listings) => {
                info!(
                    source = adapter.source().name(),
                    listings = listings.len(),
                    "summary scrape complete"
                );
                current.extend(listings);
            }
            Err(err) => {
                warn!(
                    source = adapter.source().name(),
                    error = %err,
                    "summary scrape failed, excluding source from this run"
                );
                failed_sources.push(adapter.source());
            }
        }
    }
    if failed_sources.len() == adapters.len() {
        bail!("every source failed to scrape, aborting run");
    }

    let current = dedup_by_url(current);
    let stored: Vec<ListingRecord> = stored
        .into_iter()
        .filter(|r| !failed_sources.contains(&Source::of_url(&r.url)))
        .collect();

    let rows = diff_snapshots(&current, &stored);
    let by_source = partition_by_source(rows);

    let current_by_url: HashMap<String, SummaryListing> = current
        .into_iter()
        .map(|l| (l.url.clone(), l))
        .collect();
    let stored_by_url: HashMap<&str, &ListingRecord> =
        stored.iter().map(|r| (r.url.as_str(), r)).collect();

    let mut report = SyncReport::default();
    let mut batch = OperationalBatch::default();
    let mut history: Vec<WarehouseEntry> = Vec::new();
    let now = Utc::now();

    for adapter in adapters {
        let source = adapter.source();
        let Some(rows) = by_source.get(&source) else {
            continue;
        };

        let new_rows: Vec<DiffRow> = rows
            .iter()
            .filter(|r| r.action == DiffAction::New)
            .cloned()
            .collect();
        let outcome =
            enrich_new_listings(*adapter, geocoder, &new_rows, &current_by_url).await;

        let stats = report.stats_mut(source);
        stats.skipped = outcome.skipped;
        stats.new = outcome.records.len();
        for record in outcome.records {
            history.push(WarehouseEntry {
                record: record.clone(),
                state: DiffAction::New,
                update_date: now,
            });
            batch.inserts.push(record);
        }

        for row in rows {
            match row.action {
                DiffAction::New => {}
                DiffAction::PriceChange => {
                    stats.price_changed += 1;
                    batch.price_updates.push((row.url.clone(), row.price));
                    if let Some(record) = stored_by_url.get(row.url.as_str()) {
                        history.push(WarehouseEntry {
                            record: (*record).clone().with_price(row.price),
                            state: DiffAction::PriceChange,
                            update_date: now,
                        });
                    }
                }
                DiffAction::Sold => {
                    stats.sold += 1;
                    batch.deletes.push(row.url.clone());
                    if let Some(record) = stored_by_url.get(row.url.as_str()) {
                        history.push(WarehouseEntry {
                            record: (*record).clone(),
                            state: DiffAction::Sold,
                            update_date: now,
                        });
                    }
                }
            }
        }
    }

    warehouse.append_all(&history).await?;
    operational.apply(&batch).await?;

    for (source, stats) in &report.per_source {
        info!(
            source = source.name(),
            new = stats.new,
            price_changed = stats.price_changed,
            sold = stats.sold,
            skipped = stats.skipped,
            "source synchronized"
        );
    }

    Ok(report)
}
