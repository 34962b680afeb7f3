//! Receipt image parsing seam.
//!
//! The parser is an external collaborator (OCR, a hosted model). It may be
//! slow or fail; a failure degrades the receipt instead of aborting ingestion.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::ReceiptProvider;

/// Parser failure. Never surfaced to the caller of receipt ingestion.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The backend could not be reached or answered with an error.
    #[error("receipt parser unavailable: {0}")]
    Unavailable(String),
    /// The backend answered but the image could not be read.
    #[error("receipt image unreadable: {0}")]
    Unreadable(String),
}

/// A parsed line item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedItem {
    /// Position on the receipt, if the parser reports one.
    pub line_no: Option<i32>,
    /// Item name.
    pub name: String,
    /// Quantity.
    pub quantity: Option<Decimal>,
    /// Unit price.
    pub unit_price: Option<Decimal>,
    /// Line total.
    pub line_total: Option<Decimal>,
    /// Stock keeping unit.
    pub sku: Option<String>,
    /// Category hint.
    pub category_hint: Option<String>,
}

/// Structured fields extracted from a receipt image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    /// Merchant name.
    pub merchant: Option<String>,
    /// Purchase date.
    pub purchase_date: Option<NaiveDate>,
    /// Receipt total.
    pub total: Option<Decimal>,
    /// Currency code.
    pub currency: Option<String>,
    /// Line items.
    pub items: Vec<ParsedItem>,
    /// Backend response as received. Not part of the canonical form.
    #[serde(skip)]
    pub raw: Option<serde_json::Value>,
}

/// Turns image bytes into structured receipt fields.
pub trait ReceiptParser: Send + Sync {
    /// Parses one receipt image.
    fn parse(
        &self,
        image: &[u8],
        filename: &str,
        provider: ReceiptProvider,
    ) -> impl std::future::Future<Output = Result<ParsedReceipt, ParseError>> + Send;
}
