//! Row ↔ domain conversions.

use std::str::FromStr;

use chrono::Utc;
use ledgerline_core::ledger::{Account, AccountType, Direction, LedgerError, Transaction};
use ledgerline_core::receipt::{LinkStatus, ParseStatus, Receipt, ReceiptItem, ReceiptProvider};
use ledgerline_shared::types::{
    AccountId, CategoryId, Currency, ReceiptId, ReceiptItemId, TransactionId,
};
use sea_orm::prelude::Json;
use uuid::Uuid;

use crate::entities::{
    accounts, receipt_items, receipts,
    sea_orm_active_enums::{
        AccountType as DbAccountType, ReceiptLinkStatus, ReceiptParseStatus,
        ReceiptProvider as DbReceiptProvider, TxDirection,
    },
    transactions,
};

impl From<AccountType> for DbAccountType {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Chequing => Self::Chequing,
            AccountType::Savings => Self::Savings,
            AccountType::CreditCard => Self::CreditCard,
            AccountType::Investment => Self::Investment,
            AccountType::Other => Self::Other,
        }
    }
}

impl From<DbAccountType> for AccountType {
    fn from(value: DbAccountType) -> Self {
        match value {
            DbAccountType::Chequing => Self::Chequing,
            DbAccountType::Savings => Self::Savings,
            DbAccountType::CreditCard => Self::CreditCard,
            DbAccountType::Investment => Self::Investment,
            DbAccountType::Other => Self::Other,
        }
    }
}

impl From<Direction> for TxDirection {
    fn from(value: Direction) -> Self {
        match value {
            Direction::In => Self::In,
            Direction::Out => Self::Out,
        }
    }
}

impl From<TxDirection> for Direction {
    fn from(value: TxDirection) -> Self {
        match value {
            TxDirection::In => Self::In,
            TxDirection::Out => Self::Out,
        }
    }
}

impl From<ReceiptProvider> for DbReceiptProvider {
    fn from(value: ReceiptProvider) -> Self {
        match value {
            ReceiptProvider::Local => Self::Local,
            ReceiptProvider::Gemini => Self::Gemini,
        }
    }
}

impl From<DbReceiptProvider> for ReceiptProvider {
    fn from(value: DbReceiptProvider) -> Self {
        match value {
            DbReceiptProvider::Local => Self::Local,
            DbReceiptProvider::Gemini => Self::Gemini,
        }
    }
}

impl From<ParseStatus> for ReceiptParseStatus {
    fn from(value: ParseStatus) -> Self {
        match value {
            ParseStatus::Pending => Self::Pending,
            ParseStatus::Parsed => Self::Parsed,
            ParseStatus::Failed => Self::Failed,
        }
    }
}

impl From<ReceiptParseStatus> for ParseStatus {
    fn from(value: ReceiptParseStatus) -> Self {
        match value {
            ReceiptParseStatus::Pending => Self::Pending,
            ReceiptParseStatus::Parsed => Self::Parsed,
            ReceiptParseStatus::Failed => Self::Failed,
        }
    }
}

impl From<LinkStatus> for ReceiptLinkStatus {
    fn from(value: LinkStatus) -> Self {
        match value {
            LinkStatus::Unlinked => Self::Unlinked,
            LinkStatus::Matched => Self::Matched,
            LinkStatus::NeedsVerification => Self::NeedsVerification,
        }
    }
}

impl From<ReceiptLinkStatus> for LinkStatus {
    fn from(value: ReceiptLinkStatus) -> Self {
        match value {
            ReceiptLinkStatus::Unlinked => Self::Unlinked,
            ReceiptLinkStatus::Matched => Self::Matched,
            ReceiptLinkStatus::NeedsVerification => Self::NeedsVerification,
        }
    }
}

fn currency(code: &str) -> Result<Currency, LedgerError> {
    Currency::from_str(code).map_err(LedgerError::Store)
}

fn corrupt(column: &str, err: &serde_json::Error) -> LedgerError {
    LedgerError::Store(format!("malformed {column} column: {err}"))
}

/// Category hints as stored in `transactions.suggestions`.
pub(crate) fn suggestions_json(suggestions: &[String]) -> Json {
    Json::from(suggestions.to_vec())
}

/// Transaction IDs as stored in `receipts.match_suggestions`.
pub(crate) fn transaction_ids_json(ids: &[TransactionId]) -> Json {
    Json::from(ids.iter().map(ToString::to_string).collect::<Vec<_>>())
}

pub(crate) fn account(model: accounts::Model) -> Result<Account, LedgerError> {
    Ok(Account {
        id: AccountId::from_uuid(model.id),
        anchor_currency: currency(&model.anchor_currency)?,
        name: model.name,
        bank: model.bank,
        account_type: model.account_type.into(),
        alias: model.alias,
        anchor_date: model.anchor_date,
        anchor_balance: model.anchor_balance,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn transaction(model: transactions::Model) -> Result<Transaction, LedgerError> {
    let suggestions: Vec<String> =
        serde_json::from_value(model.suggestions).map_err(|e| corrupt("suggestions", &e))?;
    Ok(Transaction {
        id: TransactionId::from_uuid(model.id),
        account_id: AccountId::from_uuid(model.account_id),
        currency: currency(&model.tx_currency)?,
        external_ref: model.external_ref,
        tx_date: model.tx_date.with_timezone(&Utc),
        amount: model.tx_amount,
        direction: model.tx_direction.into(),
        description: model.description,
        merchant: model.merchant,
        user_notes: model.user_notes,
        category_id: model.category_id.map(CategoryId::from_uuid),
        balance_after: model.balance_after,
        receipt_id: model.receipt_id.map(ReceiptId::from_uuid),
        suggestions,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn receipt_item(model: receipt_items::Model) -> ReceiptItem {
    ReceiptItem {
        id: ReceiptItemId::from_uuid(model.id),
        receipt_id: ReceiptId::from_uuid(model.receipt_id),
        line_no: model.line_no,
        name: model.name,
        quantity: model.quantity,
        unit_price: model.unit_price,
        line_total: model.line_total,
        sku: model.sku,
        category_hint: model.category_hint,
    }
}

pub(crate) fn receipt(
    model: receipts::Model,
    items: Vec<receipt_items::Model>,
) -> Result<Receipt, LedgerError> {
    let suggestions: Vec<Uuid> = serde_json::from_value(model.match_suggestions)
        .map_err(|e| corrupt("match_suggestions", &e))?;
    Ok(Receipt {
        id: ReceiptId::from_uuid(model.id),
        transaction_id: model.transaction_id.map(TransactionId::from_uuid),
        provider: model.provider.into(),
        parse_status: model.parse_status.into(),
        link_status: model.link_status.into(),
        merchant: model.merchant,
        purchase_date: model.purchase_date,
        total_amount: model.total_amount,
        currency: model.currency,
        match_suggestions: suggestions.into_iter().map(TransactionId::from_uuid).collect(),
        raw_payload: model.raw_payload,
        canonical_data: model.canonical_data,
        image_sha256: model.image_sha256,
        image_key: model.image_key,
        items: items.into_iter().map(receipt_item).collect(),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
