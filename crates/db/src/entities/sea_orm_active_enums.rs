//! Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// `account_type` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
pub enum AccountType {
    /// Chequing.
    #[sea_orm(string_value = "chequing")]
    Chequing,
    /// Savings.
    #[sea_orm(string_value = "savings")]
    Savings,
    /// Credit card.
    #[sea_orm(string_value = "credit_card")]
    CreditCard,
    /// Investment.
    #[sea_orm(string_value = "investment")]
    Investment,
    /// Other.
    #[sea_orm(string_value = "other")]
    Other,
}

/// `tx_direction` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "tx_direction")]
pub enum TxDirection {
    /// Money in.
    #[sea_orm(string_value = "in")]
    In,
    /// Money out.
    #[sea_orm(string_value = "out")]
    Out,
}

/// `receipt_provider` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "receipt_provider")]
pub enum ReceiptProvider {
    /// On-device OCR.
    #[sea_orm(string_value = "local")]
    Local,
    /// Hosted model.
    #[sea_orm(string_value = "gemini")]
    Gemini,
}

/// `receipt_parse_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "receipt_parse_status")]
pub enum ReceiptParseStatus {
    /// Not parsed yet.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Parsed.
    #[sea_orm(string_value = "parsed")]
    Parsed,
    /// Parse failed.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// `receipt_link_status` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "receipt_link_status")]
pub enum ReceiptLinkStatus {
    /// Not bound.
    #[sea_orm(string_value = "unlinked")]
    Unlinked,
    /// Bound with full confidence.
    #[sea_orm(string_value = "matched")]
    Matched,
    /// Bound, awaiting review.
    #[sea_orm(string_value = "needs_verification")]
    NeedsVerification,
}
