//! Domain types for accounts and transactions.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_shared::types::{
    AccountId, CategoryId, Currency, Cursor, Money, ReceiptId, TransactionId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Kind of household account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Everyday chequing account.
    Chequing,
    /// Savings account.
    Savings,
    /// Credit card; a negative balance is debt.
    CreditCard,
    /// Brokerage or investment account.
    Investment,
    /// Anything else.
    Other,
}

impl AccountType {
    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chequing => "chequing",
            Self::Savings => "savings",
            Self::CreditCard => "credit_card",
            Self::Investment => "investment",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chequing" => Ok(Self::Chequing),
            "savings" => Ok(Self::Savings),
            "credit_card" => Ok(Self::CreditCard),
            "investment" => Ok(Self::Investment),
            "other" => Ok(Self::Other),
            _ => Err(LedgerError::Validation(format!("unknown account type: {s}"))),
        }
    }
}

/// Money flow direction of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money entering the account.
    In,
    /// Money leaving the account.
    Out,
}

impl Direction {
    /// Applies the direction sign to an unsigned amount.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::In => amount,
            Self::Out => -amount,
        }
    }

    /// Returns the canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" => Ok(Self::In),
            "out" => Ok(Self::Out),
            _ => Err(LedgerError::InvalidDirection(s.to_string())),
        }
    }
}

/// A household account with its balance anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account ID.
    pub id: AccountId,
    /// Display name.
    pub name: String,
    /// Bank or institution.
    pub bank: String,
    /// Account kind.
    pub account_type: AccountType,
    /// Optional short alias.
    pub alias: Option<String>,
    /// Date on which `anchor_balance` is known to be exact.
    pub anchor_date: NaiveDate,
    /// Known-true balance at `anchor_date`.
    pub anchor_balance: Decimal,
    /// Currency of the anchor and of reported balances.
    pub anchor_currency: Currency,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Display name.
    pub name: String,
    /// Bank or institution.
    pub bank: String,
    /// Account kind.
    pub account_type: AccountType,
    /// Optional short alias.
    pub alias: Option<String>,
    /// Anchor date.
    pub anchor_date: NaiveDate,
    /// Anchor balance.
    pub anchor_balance: Decimal,
    /// Anchor currency.
    pub anchor_currency: Currency,
}

/// A redefinition of an account's known-true balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorReset {
    /// New anchor date.
    pub date: NaiveDate,
    /// Balance that is exact as of `date`.
    pub balance: Decimal,
    /// New anchor currency; keeps the current one when `None`.
    pub currency: Option<Currency>,
}

/// A ledger transaction with its cached running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction ID.
    pub id: TransactionId,
    /// Owning account.
    pub account_id: AccountId,
    /// Natural key from the source feed, unique per account.
    pub external_ref: Option<String>,
    /// When the transaction happened.
    pub tx_date: DateTime<Utc>,
    /// Unsigned magnitude.
    pub amount: Decimal,
    /// Transaction currency.
    pub currency: Currency,
    /// In or out.
    pub direction: Direction,
    /// Bank description line.
    pub description: Option<String>,
    /// Merchant name.
    pub merchant: Option<String>,
    /// Free-form notes.
    pub user_notes: Option<String>,
    /// Assigned category.
    pub category_id: Option<CategoryId>,
    /// Derived running balance after this transaction.
    pub balance_after: Decimal,
    /// Linked receipt.
    pub receipt_id: Option<ReceiptId>,
    /// Category hints.
    pub suggestions: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the direction sign applied.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.direction.signed(self.amount)
    }

    /// Pagination key of this row.
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.tx_date, self.id.into_inner())
    }
}

/// Input for creating a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    /// Owning account.
    pub account_id: AccountId,
    /// Natural key from the source feed.
    pub external_ref: Option<String>,
    /// When the transaction happened.
    pub tx_date: DateTime<Utc>,
    /// Unsigned magnitude, must be positive.
    pub amount: Decimal,
    /// Transaction currency.
    pub currency: Currency,
    /// In or out.
    pub direction: Direction,
    /// Bank description line.
    pub description: Option<String>,
    /// Merchant name.
    pub merchant: Option<String>,
    /// Free-form notes.
    pub user_notes: Option<String>,
    /// Assigned category.
    pub category_id: Option<CategoryId>,
    /// Category hints.
    pub suggestions: Vec<String>,
}

impl NewTransaction {
    /// Creates an input with the required fields and everything else empty.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        tx_date: DateTime<Utc>,
        amount: Decimal,
        direction: Direction,
    ) -> Self {
        Self {
            account_id,
            external_ref: None,
            tx_date,
            amount,
            currency: Currency::default(),
            direction,
            description: None,
            merchant: None,
            user_notes: None,
            category_id: None,
            suggestions: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the merchant.
    #[must_use]
    pub fn with_merchant(mut self, merchant: impl Into<String>) -> Self {
        self.merchant = Some(merchant.into());
        self
    }

    /// Sets the natural key.
    #[must_use]
    pub fn with_external_ref(mut self, external_ref: impl Into<String>) -> Self {
        self.external_ref = Some(external_ref.into());
        self
    }

    /// Materializes the row. `balance_after` stays zero until the chain is resynced.
    #[must_use]
    pub fn into_transaction(self, id: TransactionId, now: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            external_ref: self.external_ref,
            tx_date: self.tx_date,
            amount: self.amount,
            currency: self.currency,
            direction: self.direction,
            description: self.description,
            merchant: self.merchant,
            user_notes: self.user_notes,
            category_id: self.category_id,
            balance_after: Decimal::ZERO,
            receipt_id: None,
            suggestions: self.suggestions,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update descriptor for a transaction.
///
/// Only these columns are mutable. `None` leaves a field untouched; for
/// nullable columns `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionPatch {
    /// New description.
    pub description: Option<Option<String>>,
    /// New merchant.
    pub merchant: Option<Option<String>>,
    /// New notes.
    pub user_notes: Option<Option<String>>,
    /// New category.
    pub category_id: Option<Option<CategoryId>>,
    /// Replacement category hints.
    pub suggestions: Option<Vec<String>>,
    /// New transaction date.
    pub tx_date: Option<DateTime<Utc>>,
    /// New amount.
    pub amount: Option<Decimal>,
    /// New direction.
    pub direction: Option<Direction>,
    /// New currency.
    pub currency: Option<Currency>,
}

impl TransactionPatch {
    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether applying this patch to `current` moves its place or weight in the balance chain.
    #[must_use]
    pub fn requires_resync(&self, current: &Transaction) -> bool {
        self.amount.is_some_and(|a| a != current.amount)
            || self.direction.is_some_and(|d| d != current.direction)
            || self.tx_date.is_some_and(|d| d != current.tx_date)
    }

    /// Applies the patch in place.
    pub fn apply_to(&self, tx: &mut Transaction, now: DateTime<Utc>) {
        if let Some(description) = &self.description {
            tx.description.clone_from(description);
        }
        if let Some(merchant) = &self.merchant {
            tx.merchant.clone_from(merchant);
        }
        if let Some(notes) = &self.user_notes {
            tx.user_notes.clone_from(notes);
        }
        if let Some(category_id) = self.category_id {
            tx.category_id = category_id;
        }
        if let Some(suggestions) = &self.suggestions {
            tx.suggestions.clone_from(suggestions);
        }
        if let Some(tx_date) = self.tx_date {
            tx.tx_date = tx_date;
        }
        if let Some(amount) = self.amount {
            tx.amount = amount;
        }
        if let Some(direction) = self.direction {
            tx.direction = direction;
        }
        if let Some(currency) = self.currency {
            tx.currency = currency;
        }
        tx.updated_at = now;
    }
}

/// Balances summed across accounts, one entry per currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Sum of every account's current balance.
    pub net: Vec<Money>,
    /// Outstanding credit card debt as a positive amount.
    pub credit_card_debt: Vec<Money>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    fn sample() -> Transaction {
        NewTransaction::new(
            AccountId::new(),
            Utc.with_ymd_and_hms(2025, 7, 20, 9, 0, 0).unwrap(),
            dec!(100.00),
            Direction::In,
        )
        .with_description("Payroll")
        .into_transaction(TransactionId::new(), Utc::now())
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Direction::In.signed(dec!(12.50)), dec!(12.50));
        assert_eq!(Direction::Out.signed(dec!(12.50)), dec!(-12.50));
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!(Direction::from_str(" OUT ").unwrap(), Direction::Out);
        assert!(matches!(
            Direction::from_str("sideways"),
            Err(LedgerError::InvalidDirection(_))
        ));
    }

    #[test]
    fn test_account_type_round_trip() {
        for kind in [
            AccountType::Chequing,
            AccountType::Savings,
            AccountType::CreditCard,
            AccountType::Investment,
            AccountType::Other,
        ] {
            assert_eq!(AccountType::from_str(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_text_only_patch_does_not_resync() {
        let tx = sample();
        let patch = TransactionPatch {
            merchant: Some(Some("Employer Inc".into())),
            amount: Some(tx.amount),
            ..TransactionPatch::default()
        };
        assert!(!patch.requires_resync(&tx));
    }

    #[test]
    fn test_amount_direction_and_date_changes_resync() {
        let tx = sample();
        let amount = TransactionPatch {
            amount: Some(dec!(99.99)),
            ..TransactionPatch::default()
        };
        let direction = TransactionPatch {
            direction: Some(Direction::Out),
            ..TransactionPatch::default()
        };
        let date = TransactionPatch {
            tx_date: Some(tx.tx_date + chrono::Duration::days(1)),
            ..TransactionPatch::default()
        };
        assert!(amount.requires_resync(&tx));
        assert!(direction.requires_resync(&tx));
        assert!(date.requires_resync(&tx));
    }

    #[test]
    fn test_patch_clears_nullable_fields() {
        let mut tx = sample();
        let patch = TransactionPatch {
            description: Some(None),
            suggestions: Some(vec!["groceries".into()]),
            ..TransactionPatch::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut tx, Utc::now());
        assert_eq!(tx.description, None);
        assert_eq!(tx.suggestions, vec!["groceries".to_string()]);
        assert!(TransactionPatch::default().is_empty());
    }
}
