use listing_sync::config::Config;
use listing_sync::geocoding::NominatimClient;
use listing_sync::scrapers::{DuProprioAdapter, RoyalLepageAdapter, SourceAdapter};
use listing_sync::store::{OperationalStore, WarehouseStore};
use listing_sync::sync::run_sync;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();
    info!(
        operational = %config.operational_db_url,
        warehouse = %config.warehouse_db_url,
        "starting sync run"
    );

    // Run-scoped resources: opened here, closed before exit, never shared
    // across runs.
    let operational = OperationalStore::connect(&config.operational_db_url).await?;
    let warehouse = WarehouseStore::connect(&config.warehouse_db_url).await?;

    let duproprio = DuProprioAdapter::new()?;
    let royallepage = RoyalLepageAdapter::new()?;
    let geocoder = NominatimClient::new()?;
    let adapters: Vec<&dyn SourceAdapter> = vec![&duproprio, &royallepage];

    let report = run_sync(&adapters, &geocoder, &operational, &warehouse).await?;

    let totals = report.per_source.values().fold((0, 0, 0), |acc, s| {
        (acc.0 + s.new, acc.1 + s.price_changed, acc.2 + s.sold)
    });
    info!(
        new = totals.0,
        price_changed = totals.1,
        sold = totals.2,
        "sync run complete"
    );

    operational.close().await;
    warehouse.close().await;
    Ok(())
}
