//! Input validation for ledger mutations.

use rust_decimal::Decimal;

use super::error::LedgerError;
use super::types::{AnchorReset, NewAccount, NewTransaction, TransactionPatch};

/// Decimal places kept by the store (`NUMERIC(19,4)`).
pub const MAX_AMOUNT_SCALE: u32 = 4;

/// Exclusive bound on any stored magnitude: `NUMERIC(19,4)` holds 15 integer digits.
pub const AMOUNT_LIMIT: Decimal = Decimal::from_parts(2_764_472_320, 232_830, 0, false, 0);

/// True when `value` fits a `NUMERIC(19,4)` column.
#[must_use]
pub fn is_storable(value: Decimal) -> bool {
    value.abs() < AMOUNT_LIMIT
}

/// Validates an unsigned transaction magnitude.
pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount.is_zero() {
        return Err(LedgerError::ZeroAmount);
    }
    if amount.is_sign_negative() {
        return Err(LedgerError::NegativeAmount);
    }
    validate_scale(amount)
}

fn validate_scale(amount: Decimal) -> Result<(), LedgerError> {
    if !is_storable(amount) {
        return Err(LedgerError::AmountOutOfRange(amount));
    }
    if amount.normalize().scale() > MAX_AMOUNT_SCALE {
        return Err(LedgerError::AmountPrecision(amount));
    }
    Ok(())
}

fn require_text(field: &str, value: &str) -> Result<(), LedgerError> {
    if value.trim().is_empty() {
        return Err(LedgerError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

/// Validates account creation input.
pub fn validate_new_account(input: &NewAccount) -> Result<(), LedgerError> {
    require_text("name", &input.name)?;
    require_text("bank", &input.bank)?;
    validate_scale(input.anchor_balance)
}

/// Validates an anchor reset. Any sign is allowed for the balance.
pub fn validate_anchor(reset: &AnchorReset) -> Result<(), LedgerError> {
    validate_scale(reset.balance)
}

/// Validates transaction creation input.
pub fn validate_new_transaction(input: &NewTransaction) -> Result<(), LedgerError> {
    validate_amount(input.amount)?;
    if let Some(external_ref) = &input.external_ref {
        require_text("external_ref", external_ref)?;
    }
    Ok(())
}

/// Validates a transaction update descriptor.
pub fn validate_patch(patch: &TransactionPatch) -> Result<(), LedgerError> {
    if patch.is_empty() {
        return Err(LedgerError::Validation("no fields to update".to_string()));
    }
    if let Some(amount) = patch.amount {
        validate_amount(amount)?;
    }
    Ok(())
}
