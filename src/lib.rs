pub mod config;
pub mod diff;
pub mod enrich;
pub mod geocoding;
pub mod models;
pub mod scrapers;
pub mod store;
pub mod sync;
