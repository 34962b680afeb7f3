//! Ledger error types.
//!
//! Every variant collapses into one of the four [`ErrorKind`]s so callers
//! outside the core can map failures without matching on domain detail.

use ledgerline_shared::types::{AccountId, CursorError, ReceiptId, TransactionId};
use ledgerline_shared::{AppError, ErrorKind};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur during ledger and receipt operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Not Found ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Transaction not found.
    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Receipt not found.
    #[error("Receipt not found: {0}")]
    ReceiptNotFound(ReceiptId),

    // ========== Conflict ==========
    /// The target transaction already carries a receipt.
    #[error("Transaction {transaction_id} already has receipt {existing} linked")]
    ReceiptAlreadyLinked {
        /// Transaction the link was attempted against.
        transaction_id: TransactionId,
        /// Receipt currently linked.
        existing: ReceiptId,
    },

    /// Receipt is already bound to some transaction.
    #[error("Receipt {0} is already linked to a transaction")]
    ReceiptNotLinkable(ReceiptId),

    /// A transaction with the same natural key exists on the account.
    #[error("Duplicate transaction {external_ref} on account {account_id}")]
    DuplicateTransaction {
        /// Owning account.
        account_id: AccountId,
        /// Conflicting natural key.
        external_ref: String,
    },

    // ========== Validation ==========
    /// Amount cannot be zero.
    #[error("Transaction amount cannot be zero")]
    ZeroAmount,

    /// Amount cannot be negative.
    #[error("Transaction amount cannot be negative; use direction instead")]
    NegativeAmount,

    /// Amount has more decimal places than the store keeps.
    #[error("Amount {0} has more than 4 decimal places")]
    AmountPrecision(Decimal),

    /// Amount or balance magnitude does not fit the store.
    #[error("Amount {0} is outside the storable range")]
    AmountOutOfRange(Decimal),

    /// Direction is not `in` or `out`.
    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    /// A list filter value could not be parsed.
    #[error("Invalid filter {field}: {message}")]
    InvalidFilter {
        /// Filter name.
        field: &'static str,
        /// What was wrong with it.
        message: String,
    },

    /// Other input validation failure.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ========== Internal ==========
    /// Underlying store failure.
    #[error("Store error: {0}")]
    Store(String),
}

impl LedgerError {
    /// Convenience constructor for filter errors.
    #[must_use]
    pub fn invalid_filter(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            field,
            message: message.into(),
        }
    }

    /// Returns the failure class.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::AccountNotFound(_) | Self::TransactionNotFound(_) | Self::ReceiptNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::ReceiptAlreadyLinked { .. }
            | Self::ReceiptNotLinkable(_)
            | Self::DuplicateTransaction { .. } => ErrorKind::Conflict,
            Self::ZeroAmount
            | Self::NegativeAmount
            | Self::AmountPrecision(_)
            | Self::AmountOutOfRange(_)
            | Self::InvalidDirection(_)
            | Self::InvalidFilter { .. }
            | Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::TransactionNotFound(_) => "TRANSACTION_NOT_FOUND",
            Self::ReceiptNotFound(_) => "RECEIPT_NOT_FOUND",
            Self::ReceiptAlreadyLinked { .. } => "RECEIPT_ALREADY_LINKED",
            Self::ReceiptNotLinkable(_) => "RECEIPT_NOT_LINKABLE",
            Self::DuplicateTransaction { .. } => "DUPLICATE_TRANSACTION",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AmountPrecision(_) => "AMOUNT_PRECISION",
            Self::AmountOutOfRange(_) => "AMOUNT_OUT_OF_RANGE",
            Self::InvalidDirection(_) => "INVALID_DIRECTION",
            Self::InvalidFilter { .. } => "INVALID_FILTER",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// True for the Conflict class.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

impl From<CursorError> for LedgerError {
    fn from(err: CursorError) -> Self {
        Self::invalid_filter("cursor", err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::from_kind(err.kind(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LedgerError::AccountNotFound(AccountId::new()), ErrorKind::NotFound)]
    #[case(LedgerError::ReceiptNotFound(ReceiptId::new()), ErrorKind::NotFound)]
    #[case(
        LedgerError::ReceiptAlreadyLinked { transaction_id: TransactionId::new(), existing: ReceiptId::new() },
        ErrorKind::Conflict
    )]
    #[case(
        LedgerError::DuplicateTransaction { account_id: AccountId::new(), external_ref: "x".into() },
        ErrorKind::Conflict
    )]
    #[case(LedgerError::ZeroAmount, ErrorKind::Validation)]
    #[case(LedgerError::AmountOutOfRange(Decimal::MAX), ErrorKind::Validation)]
    #[case(LedgerError::invalid_filter("start_date", "bad"), ErrorKind::Validation)]
    #[case(LedgerError::Store("boom".into()), ErrorKind::Internal)]
    fn test_error_kinds(#[case] err: LedgerError, #[case] kind: ErrorKind) {
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_into_app_error_keeps_kind_and_message() {
        let err = LedgerError::invalid_filter("amount_min", "not a number");
        let app: AppError = err.into();
        assert_eq!(app.kind(), ErrorKind::Validation);
        assert_eq!(
            app.to_string(),
            "Validation error: Invalid filter amount_min: not a number"
        );
    }

    #[test]
    fn test_cursor_error_is_validation() {
        let err: LedgerError = CursorError::Encoding.into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.error_code(), "INVALID_FILTER");
    }
}
