//! Mapping from `SeaORM` errors to ledger errors.

use ledgerline_core::ledger::LedgerError;
use sea_orm::{DbErr, SqlErr};

/// Unique constraint guarding `(account_id, external_ref)`.
pub(crate) const TRANSACTION_REF_CONSTRAINT: &str = "uq_transactions_account_ref";

/// Partial unique indexes guarding one receipt per transaction.
pub(crate) const RECEIPT_LINK_CONSTRAINTS: [&str; 2] = ["uq_receipts_transaction", "uq_transactions_receipt"];

/// Anything unexpected from the database becomes an internal store failure.
pub(crate) fn store_error(err: DbErr) -> LedgerError {
    LedgerError::Store(err.to_string())
}

/// Whether `err` is a unique violation on one of `constraints`.
pub(crate) fn violates(err: &DbErr, constraints: &[&str]) -> bool {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(message)) => {
            constraints.iter().any(|name| message.contains(name))
        }
        _ => false,
    }
}
