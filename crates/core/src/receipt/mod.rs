//! Receipt reconciliation.
//!
//! This module implements:
//! - Receipt and line item domain types
//! - The parser seam for external image parsing
//! - Candidate scoring and selection
//! - The ingestion service (manual link and auto match)

pub mod matcher;
pub mod parser;
pub mod service;
pub mod types;

pub use matcher::{Candidate, CandidateWindow, MatchOutcome, MatchScore, ReceiptFacts};
pub use parser::{ParseError, ParsedItem, ParsedReceipt, ReceiptParser};
pub use service::ReceiptService;
pub use types::{
    LinkStatus, NewReceipt, NewReceiptItem, ParseStatus, Receipt, ReceiptItem, ReceiptProvider,
};
