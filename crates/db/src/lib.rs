//! Database layer for Ledgerline.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repositories mapping rows to `ledgerline-core` types
//! - [`PgLedgerStore`], the Postgres implementation of the ledger store
//! - Database migrations

pub mod entities;
mod error;
pub mod migration;
pub mod repositories;
pub mod store;

pub use repositories::{
    AccountRepository, CategoryRepository, ReceiptRepository, TransactionRepository,
};
pub use store::PgLedgerStore;

use std::time::Duration;

use ledgerline_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use tracing::info;

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Opens a pool sized from configuration.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "connecting to database"
    );
    Database::connect(options).await
}
