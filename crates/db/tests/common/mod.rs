//! Shared setup for the Postgres integration tests.
//!
//! Every test skips itself when `DATABASE_URL` is not set.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ledgerline_core::ledger::{AccountType, Direction, NewAccount, NewTransaction};
use ledgerline_db::migration::Migrator;
use ledgerline_shared::types::{AccountId, Currency};
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::OnceCell;
use uuid::Uuid;

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connects and migrates, or `None` when `DATABASE_URL` is unset or unreachable.
pub async fn setup() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return None;
    };
    let db = match Database::connect(&url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Skipping test: database not available: {e}");
            return None;
        }
    };
    // Test binaries run tests in parallel; migrate once per binary.
    if let Err(e) = MIGRATED
        .get_or_try_init(|| async { Migrator::up(&db, None).await })
        .await
    {
        eprintln!("Skipping test: migrations failed: {e}");
        return None;
    }
    Some(db)
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn new_account(anchor_date: NaiveDate, anchor_balance: Decimal) -> NewAccount {
    NewAccount {
        name: format!("Test Chequing {}", Uuid::new_v4()),
        bank: "Test Bank".to_string(),
        account_type: AccountType::Chequing,
        alias: None,
        anchor_date,
        anchor_balance,
        anchor_currency: Currency::Cad,
    }
}

pub fn new_tx(
    account_id: AccountId,
    tx_date: DateTime<Utc>,
    amount: Decimal,
    direction: Direction,
) -> NewTransaction {
    NewTransaction {
        account_id,
        external_ref: None,
        tx_date,
        amount,
        currency: Currency::Cad,
        direction,
        description: None,
        merchant: None,
        user_notes: None,
        category_id: None,
        suggestions: Vec::new(),
    }
}
