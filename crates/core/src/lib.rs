//! Core business logic for Ledgerline.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Storage sits behind the [`ledger::LedgerStore`] trait.
//!
//! # Modules
//!
//! - `ledger` - Accounts, transactions, anchor-based running balances, and queries
//! - `receipt` - Receipt ingestion, scoring, and exclusive linking
//! - `storage` - Content-addressed receipt image archive

pub mod ledger;
pub mod receipt;
pub mod storage;
