use sea_orm::{ConnectOptions, Database as SeaDatabase, DatabaseConnection};
use std::time::Duration;

use crate::config::Config;

/// Initialize the database connection for the sea-orm session store.
pub async fn connect(url: &str, config: &Config) -> Result<DatabaseConnection, sea_orm::DbErr> {
    // SQLite in-memory databases are per-connection; keep the pool at one.
    let max_connections = if url.starts_with("sqlite") { 1 } else { 20 };

    let mut opts = ConnectOptions::new(url);
    opts.max_connections(max_connections)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(8))
        .acquire_timeout(Duration::from_secs(8))
        .sqlx_logging(config.is_dev());

    SeaDatabase::connect(opts).await
}
