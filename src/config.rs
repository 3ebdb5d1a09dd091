use std::env;

/// Run configuration, read from the environment (a `.env` file is honored
/// when present).
#[derive(Debug, Clone)]
pub struct Config {
    /// Mutable current-state store.
    pub operational_db_url: String,
    /// Append-only history store.
    pub warehouse_db_url: String,
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            operational_db_url: env::var("OPERATIONAL_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://listings.db".to_string()),
            warehouse_db_url: env::var("WAREHOUSE_DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://warehouse.db".to_string()),
        }
    }
}
