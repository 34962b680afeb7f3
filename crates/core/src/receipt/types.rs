//! Receipt domain types.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerline_shared::types::{ReceiptId, ReceiptItemId, TransactionId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ledger::LedgerError;

macro_rules! string_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Returns the canonical lowercase name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(LedgerError::Validation(format!(concat!("unknown ", $label, ": {}"), s))),
                }
            }
        }
    };
}

/// Which parsing backend handles the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceiptProvider {
    /// On-device OCR.
    #[default]
    Local,
    /// Hosted vision model.
    Gemini,
}

string_enum!(ReceiptProvider, "receipt provider", { Local => "local", Gemini => "gemini" });

/// Parse lifecycle. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseStatus {
    /// Not parsed yet.
    #[default]
    Pending,
    /// Parser returned structured fields.
    Parsed,
    /// Parser failed; terminal.
    Failed,
}

string_enum!(ParseStatus, "parse status", {
    Pending => "pending",
    Parsed => "parsed",
    Failed => "failed",
});

/// Whether, and how confidently, the receipt is bound to a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Not bound.
    #[default]
    Unlinked,
    /// Bound with full confidence, or by the user.
    Matched,
    /// Bound by the matcher below full confidence.
    NeedsVerification,
}

string_enum!(LinkStatus, "link status", {
    Unlinked => "unlinked",
    Matched => "matched",
    NeedsVerification => "needs_verification",
});

/// A line on a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptItem {
    /// Item ID.
    pub id: ReceiptItemId,
    /// Owning receipt.
    pub receipt_id: ReceiptId,
    /// 1-based position on the receipt.
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
    /// Category hint from the parser.
    pub category_hint: Option<String>,
}

/// A scanned receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Receipt ID.
    pub id: ReceiptId,
    /// Linked transaction.
    pub transaction_id: Option<TransactionId>,
    /// Parser backend used.
    pub provider: ReceiptProvider,
    /// Parse lifecycle.
    pub parse_status: ParseStatus,
    /// Link lifecycle.
    pub link_status: LinkStatus,
    /// Merchant name.
    pub merchant: Option<String>,
    /// Purchase date.
    pub purchase_date: Option<NaiveDate>,
    /// Receipt total.
    pub total_amount: Option<Decimal>,
    /// Currency code as printed.
    pub currency: Option<String>,
    /// Other plausible transactions, best first.
    pub match_suggestions: Vec<TransactionId>,
    /// Parser output as received.
    pub raw_payload: Option<serde_json::Value>,
    /// Normalized parse result.
    pub canonical_data: Option<serde_json::Value>,
    /// SHA-256 of the image, lowercase hex.
    pub image_sha256: Option<String>,
    /// Archive key of the image.
    pub image_key: Option<String>,
    /// Line items.
    pub items: Vec<ReceiptItem>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Line item to insert with a new receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReceiptItem {
    /// 1-based position.
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

/// Receipt row to insert. New receipts are always unlinked.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NewReceipt {
    /// Parser backend used.
    pub provider: ReceiptProvider,
    /// Result of parsing.
    pub parse_status: ParseStatus,
    /// Merchant name.
    pub merchant: Option<String>,
    /// Purchase date.
    pub purchase_date: Option<NaiveDate>,
    /// Receipt total.
    pub total_amount: Option<Decimal>,
    /// Currency code.
    pub currency: Option<String>,
    /// Ranked alternatives from the matcher.
    pub match_suggestions: Vec<TransactionId>,
    /// Parser output as received.
    pub raw_payload: Option<serde_json::Value>,
    /// Normalized parse result.
    pub canonical_data: Option<serde_json::Value>,
    /// SHA-256 of the image.
    pub image_sha256: Option<String>,
    /// Archive key.
    pub image_key: Option<String>,
    /// Line items.
    pub items: Vec<NewReceiptItem>,
}

impl NewReceipt {
    /// Materializes the row with fresh item IDs.
    #[must_use]
    pub fn into_receipt(self, id: ReceiptId, now: DateTime<Utc>) -> Receipt {
        let items = self
            .items
            .into_iter()
            .map(|item| ReceiptItem {
                id: ReceiptItemId::new(),
                receipt_id: id,
                line_no: item.line_no,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
                line_total: item.line_total,
                sku: item.sku,
                category_hint: item.category_hint,
            })
            .collect();

        Receipt {
            id,
            transaction_id: None,
            provider: self.provider,
            parse_status: self.parse_status,
            link_status: LinkStatus::Unlinked,
            merchant: self.merchant,
            purchase_date: self.purchase_date,
            total_amount: self.total_amount,
            currency: self.currency,
            match_suggestions: self.match_suggestions,
            raw_payload: self.raw_payload,
            canonical_data: self.canonical_data,
            image_sha256: self.image_sha256,
            image_key: self.image_key,
            items,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_status_round_trip() {
        for status in [LinkStatus::Unlinked, LinkStatus::Matched, LinkStatus::NeedsVerification] {
            assert_eq!(LinkStatus::from_str(status.as_str()).unwrap(), status);
        }
        for status in [ParseStatus::Pending, ParseStatus::Parsed, ParseStatus::Failed] {
            assert_eq!(ParseStatus::from_str(status.as_str()).unwrap(), status);
        }
        assert_eq!(ReceiptProvider::from_str("GEMINI").unwrap(), ReceiptProvider::Gemini);
        assert!(ReceiptProvider::from_str("paper").is_err());
    }

    #[test]
    fn test_new_receipt_starts_unlinked() {
        let receipt = NewReceipt {
            items: vec![NewReceiptItem {
                line_no: Some(1),
                name: "Milk".into(),
                quantity: None,
                unit_price: None,
                line_total: None,
                sku: None,
                category_hint: None,
            }],
            ..NewReceipt::default()
        }
        .into_receipt(ReceiptId::new(), Utc::now());

        assert_eq!(receipt.link_status, LinkStatus::Unlinked);
        assert_eq!(receipt.parse_status, ParseStatus::Pending);
        assert_eq!(receipt.items[0].receipt_id, receipt.id);
        assert!(receipt.transaction_id.is_none());
    }
}
