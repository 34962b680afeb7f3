//! Initial database migration.
//!
//! Creates the enums, the ledger tables, the receipt tables, and the circular
//! transaction/receipt foreign keys.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: LEDGER
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(CATEGORIES_SQL).await?;
        db.execute_unprepared(TRANSACTIONS_SQL).await?;

        // ============================================================
        // PART 3: RECEIPTS
        // ============================================================
        db.execute_unprepared(RECEIPTS_SQL).await?;
        db.execute_unprepared(RECEIPT_ITEMS_SQL).await?;

        // ============================================================
        // PART 4: CIRCULAR LINK
        // ============================================================
        db.execute_unprepared(RECEIPT_LINK_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM ('chequing', 'savings', 'credit_card', 'investment', 'other');
CREATE TYPE tx_direction AS ENUM ('in', 'out');
CREATE TYPE receipt_provider AS ENUM ('local', 'gemini');
CREATE TYPE receipt_parse_status AS ENUM ('pending', 'parsed', 'failed');
CREATE TYPE receipt_link_status AS ENUM ('unlinked', 'matched', 'needs_verification');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    bank VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    alias VARCHAR(64),
    anchor_date DATE NOT NULL,
    anchor_balance NUMERIC(19, 4) NOT NULL DEFAULT 0,
    anchor_currency VARCHAR(3) NOT NULL DEFAULT 'CAD',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_accounts_name CHECK (length(trim(name)) > 0)
);

CREATE INDEX idx_accounts_name ON accounts(name, id);
";

const CATEGORIES_SQL: &str = r"
CREATE TABLE categories (
    id UUID PRIMARY KEY,
    slug VARCHAR(64) NOT NULL,
    label VARCHAR(128) NOT NULL,
    color VARCHAR(16),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_categories_slug UNIQUE (slug)
);
";

const TRANSACTIONS_SQL: &str = r"
CREATE TABLE transactions (
    id UUID PRIMARY KEY,
    account_id UUID NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    external_ref VARCHAR(255),
    tx_date TIMESTAMPTZ NOT NULL,
    tx_amount NUMERIC(19, 4) NOT NULL,
    tx_currency VARCHAR(3) NOT NULL DEFAULT 'CAD',
    tx_direction tx_direction NOT NULL,
    description TEXT,
    merchant TEXT,
    user_notes TEXT,
    category_id UUID REFERENCES categories(id) ON DELETE SET NULL,
    balance_after NUMERIC(19, 4) NOT NULL DEFAULT 0,
    receipt_id UUID,
    suggestions JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_tx_amount_positive CHECK (tx_amount > 0),
    CONSTRAINT uq_transactions_account_ref UNIQUE (account_id, external_ref)
);

-- Balance chain walk per account
CREATE INDEX idx_transactions_chain ON transactions(account_id, tx_date, id);

-- Listing order and cursor seek
CREATE INDEX idx_transactions_listing ON transactions(tx_date DESC, id DESC);

-- Receipt candidate search
CREATE INDEX idx_transactions_candidates ON transactions(tx_date, tx_amount)
    WHERE receipt_id IS NULL AND tx_direction = 'out';
";

const RECEIPTS_SQL: &str = r"
CREATE TABLE receipts (
    id UUID PRIMARY KEY,
    transaction_id UUID REFERENCES transactions(id) ON DELETE SET NULL,
    provider receipt_provider NOT NULL DEFAULT 'local',
    parse_status receipt_parse_status NOT NULL DEFAULT 'pending',
    link_status receipt_link_status NOT NULL DEFAULT 'unlinked',
    merchant TEXT,
    purchase_date DATE,
    total_amount NUMERIC(19, 4),
    currency VARCHAR(8),
    match_suggestions JSONB NOT NULL DEFAULT '[]'::jsonb,
    raw_payload JSONB,
    canonical_data JSONB,
    image_sha256 VARCHAR(64),
    image_key TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

-- One receipt per transaction
CREATE UNIQUE INDEX uq_receipts_transaction ON receipts(transaction_id)
    WHERE transaction_id IS NOT NULL;

CREATE INDEX idx_receipts_image_sha256 ON receipts(image_sha256);
";

const RECEIPT_ITEMS_SQL: &str = r"
CREATE TABLE receipt_items (
    id UUID PRIMARY KEY,
    receipt_id UUID NOT NULL REFERENCES receipts(id) ON DELETE CASCADE,
    line_no INTEGER,
    name TEXT NOT NULL,
    quantity NUMERIC(19, 4),
    unit_price NUMERIC(19, 4),
    line_total NUMERIC(19, 4),
    sku VARCHAR(64),
    category_hint VARCHAR(64)
);

CREATE INDEX idx_receipt_items_receipt ON receipt_items(receipt_id, line_no);
";

const RECEIPT_LINK_SQL: &str = r"
ALTER TABLE transactions
    ADD CONSTRAINT fk_transactions_receipt
    FOREIGN KEY (receipt_id) REFERENCES receipts(id) ON DELETE SET NULL;

CREATE UNIQUE INDEX uq_transactions_receipt ON transactions(receipt_id)
    WHERE receipt_id IS NOT NULL;
";

const DROP_SQL: &str = r"
ALTER TABLE IF EXISTS transactions DROP CONSTRAINT IF EXISTS fk_transactions_receipt;
DROP TABLE IF EXISTS receipt_items CASCADE;
DROP TABLE IF EXISTS receipts CASCADE;
DROP TABLE IF EXISTS transactions CASCADE;
DROP TABLE IF EXISTS categories CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TYPE IF EXISTS receipt_link_status;
DROP TYPE IF EXISTS receipt_parse_status;
DROP TYPE IF EXISTS receipt_provider;
DROP TYPE IF EXISTS tx_direction;
DROP TYPE IF EXISTS account_type;
";
