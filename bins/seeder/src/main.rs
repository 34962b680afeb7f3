//! Demo data seeder for Ledgerline.
//!
//! Seeds the category list and a small household ledger (a chequing account
//! and a credit card with a month of activity, plus one scanned receipt)
//! through the ledger and receipt services. Safe to re-run.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ledgerline_core::ledger::{
    AccountType, Direction, LedgerService, NewAccount, NewTransaction,
};
use ledgerline_core::receipt::{
    ParseError, ParsedItem, ParsedReceipt, ReceiptParser, ReceiptProvider, ReceiptService,
};
use ledgerline_core::storage::{ReceiptImageStore, StorageConfig};
use ledgerline_db::PgLedgerStore;
use ledgerline_db::entities::categories;
use ledgerline_db::migration::Migrator;
use ledgerline_shared::AppConfig;
use ledgerline_shared::config::ReceiptConfig;
use ledgerline_shared::types::Currency;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use sea_orm_migration::MigratorTrait;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// `(slug, label, color)`
const CATEGORIES: &[(&str, &str, Option<&str>)] = &[
    ("groceries", "Groceries", Some("#4caf50")),
    ("dining", "Dining Out", Some("#ff9800")),
    ("transport", "Transport", Some("#2196f3")),
    ("utilities", "Utilities", Some("#9c27b0")),
    ("housing", "Housing", Some("#795548")),
    ("income", "Income", Some("#009688")),
    ("other", "Other", None),
];

const CHEQUING_NAME: &str = "Demo Chequing";
const CARD_NAME: &str = "Demo Visa";
const DEMO_BANK: &str = "Prairie Credit Union";

/// One seeded statement line.
struct DemoLine {
    day: u32,
    hour: u32,
    amount: Decimal,
    direction: Direction,
    merchant: &'static str,
    description: &'static str,
    category: &'static str,
}

fn line(
    day: u32,
    hour: u32,
    amount: Decimal,
    direction: Direction,
    merchant: &'static str,
    description: &'static str,
    category: &'static str,
) -> DemoLine {
    DemoLine {
        day,
        hour,
        amount,
        direction,
        merchant,
        description,
        category,
    }
}

fn chequing_lines() -> Vec<DemoLine> {
    vec![
        line(1, 9, dec!(2400.00), Direction::In, "ACME PAYROLL", "PAYROLL DEPOSIT", "income"),
        line(1, 12, dec!(1650.00), Direction::Out, "Northgate Property", "RENT AUG", "housing"),
        line(6, 8, dec!(84.21), Direction::Out, "City Utilities", "PAD UTILITIES", "utilities"),
        line(15, 9, dec!(2400.00), Direction::In, "ACME PAYROLL", "PAYROLL DEPOSIT", "income"),
        line(20, 10, dec!(300.00), Direction::Out, "Demo Visa", "CARD PAYMENT", "other"),
    ]
}

fn card_lines() -> Vec<DemoLine> {
    vec![
        line(3, 18, dec!(112.37), Direction::Out, "Real Canadian Superstore", "Superstore Groceries", "groceries"),
        line(9, 20, dec!(46.50), Direction::Out, "Pho Saigon", "PHO SAIGON #2", "dining"),
        line(12, 7, dec!(3.35), Direction::Out, "Transit Authority", "TRANSIT FARE", "transport"),
        line(17, 19, dec!(71.04), Direction::Out, "Costco Wholesale", "COSTCO WHOLESALE W512", "groceries"),
        line(30, 17, dec!(54.81), Direction::Out, "Real Canadian Superstore", "Superstore Groceries", "groceries"),
    ]
}

/// Stands in for the external parser with the fields of a known receipt.
struct DemoReceiptParser;

impl ReceiptParser for DemoReceiptParser {
    async fn parse(
        &self,
        _image: &[u8],
        _filename: &str,
        _provider: ReceiptProvider,
    ) -> Result<ParsedReceipt, ParseError> {
        Ok(ParsedReceipt {
            merchant: Some("Superstore".to_string()),
            purchase_date: NaiveDate::from_ymd_opt(2025, 8, 30),
            total: Some(dec!(54.81)),
            currency: Some("CAD".to_string()),
            items: vec![
                ParsedItem {
                    name: "Bananas".to_string(),
                    quantity: Some(dec!(1.2)),
                    unit_price: Some(dec!(1.74)),
                    line_total: Some(dec!(2.09)),
                    category_hint: Some("groceries".to_string()),
                    ..ParsedItem::default()
                },
                ParsedItem {
                    name: "Chicken Thighs".to_string(),
                    quantity: Some(dec!(1)),
                    line_total: Some(dec!(18.99)),
                    category_hint: Some("groceries".to_string()),
                    ..ParsedItem::default()
                },
                ParsedItem {
                    name: "Laundry Detergent".to_string(),
                    quantity: Some(dec!(1)),
                    line_total: Some(dec!(33.73)),
                    ..ParsedItem::default()
                },
            ],
            raw: None,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = ledgerline_db::connect_with(&config.database).await?;
    info!("Connected to database");

    Migrator::up(&db, None).await?;

    seed_categories(&db).await?;

    let store = Arc::new(PgLedgerStore::new(db));
    let ledger = LedgerService::new(Arc::clone(&store));

    let existing = ledger.list_accounts().await?;
    if existing.iter().any(|a| a.name == CHEQUING_NAME) {
        info!("Demo ledger already present, skipping");
        return Ok(());
    }

    let anchor = NaiveDate::from_ymd_opt(2025, 8, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid anchor date"))?;

    let chequing = ledger
        .create_account(NewAccount {
            name: CHEQUING_NAME.to_string(),
            bank: DEMO_BANK.to_string(),
            account_type: AccountType::Chequing,
            alias: Some("Everyday".to_string()),
            anchor_date: anchor,
            anchor_balance: dec!(1825.40),
            anchor_currency: Currency::Cad,
        })
        .await?;
    let card = ledger
        .create_account(NewAccount {
            name: CARD_NAME.to_string(),
            bank: DEMO_BANK.to_string(),
            account_type: AccountType::CreditCard,
            alias: None,
            anchor_date: anchor,
            anchor_balance: dec!(-320.00),
            anchor_currency: Currency::Cad,
        })
        .await?;

    for (account, lines) in [(&chequing, chequing_lines()), (&card, card_lines())] {
        for (n, demo) in lines.into_iter().enumerate() {
            let tx = ledger
                .create_transaction(NewTransaction {
                    account_id: account.id,
                    external_ref: Some(format!("DEMO-{}-{n:03}", account.name.to_uppercase())),
                    tx_date: demo_time(demo.day, demo.hour)?,
                    amount: demo.amount,
                    currency: Currency::Cad,
                    direction: demo.direction,
                    description: Some(demo.description.to_string()),
                    merchant: Some(demo.merchant.to_string()),
                    user_notes: None,
                    category_id: None,
                    suggestions: Vec::new(),
                })
                .await?;
            ledger
                .apply_category_suggestion(
                    store.as_ref(),
                    tx.id,
                    demo.category,
                    vec![demo.category.to_string()],
                )
                .await?;
        }
    }

    seed_receipt(Arc::clone(&store), &config.receipts).await?;

    let summary = ledger.balance_summary().await?;
    for money in &summary.net {
        info!(net = %money, "Demo ledger seeded");
    }
    for money in &summary.credit_card_debt {
        info!(credit_card_debt = %money, "Demo ledger seeded");
    }

    Ok(())
}

fn demo_time(day: u32, hour: u32) -> anyhow::Result<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2025, 8, day, hour, 0, 0)
        .single()
        .ok_or_else(|| anyhow::anyhow!("invalid demo timestamp 2025-08-{day} {hour}:00"))
}

/// Inserts any missing categories.
async fn seed_categories(db: &DatabaseConnection) -> anyhow::Result<()> {
    let mut inserted = 0_usize;
    for (slug, label, color) in CATEGORIES {
        let exists = categories::Entity::find()
            .filter(categories::Column::Slug.eq(*slug))
            .one(db)
            .await?
            .is_some();
        if exists {
            continue;
        }

        categories::ActiveModel {
            id: Set(Uuid::now_v7()),
            slug: Set((*slug).to_string()),
            label: Set((*label).to_string()),
            color: Set(color.map(str::to_string)),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;
        inserted += 1;
    }
    info!(inserted, total = CATEGORIES.len(), "Categories seeded");
    Ok(())
}

/// Runs one receipt through auto-matching against the seeded card activity.
async fn seed_receipt(store: Arc<PgLedgerStore>, settings: &ReceiptConfig) -> anyhow::Result<()> {
    let provider: ReceiptProvider = settings.default_provider.parse()?;

    let mut receipts = ReceiptService::new(store, Arc::new(DemoReceiptParser));
    match StorageConfig::from_settings(&settings.storage, settings.max_image_bytes)
        .and_then(ReceiptImageStore::from_config)
    {
        Ok(images) => receipts = receipts.with_image_store(images),
        Err(e) => warn!(error = %e, "Receipt image archive unavailable, images will not be kept"),
    }

    let receipt = receipts
        .match_and_suggest(b"demo receipt image", "superstore-2025-08-30.jpg", provider)
        .await?;
    info!(
        receipt_id = %receipt.id,
        link_status = %receipt.link_status,
        suggestions = receipt.match_suggestions.len(),
        "Demo receipt ingested"
    );
    Ok(())
}
