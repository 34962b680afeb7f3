//! Household ledger: accounts, transactions, and anchor-based running balances.
//!
//! This module implements:
//! - Account and transaction domain types
//! - The balance synchronizer (full chain recompute against the anchor)
//! - Transaction filters and cursor-ordered listing
//! - The storage seam and an in-memory implementation
//! - The ledger service

pub mod balance;
pub mod error;
pub mod memory;
pub mod query;
pub mod service;
pub mod store;
pub mod types;
pub mod validation;

#[cfg(test)]
mod service_props;

pub use balance::{Anchor, ChainEntry};
pub use error::LedgerError;
pub use memory::InMemoryLedgerStore;
pub use query::{RawTransactionQuery, TransactionFilter, TransactionQuery};
pub use service::LedgerService;
pub use store::{CategoryLookup, LedgerStore};
pub use types::{
    Account, AccountType, AnchorReset, BalanceSummary, Direction, NewAccount, NewTransaction,
    Transaction, TransactionPatch,
};
