//! Repositories over the `SeaORM` entities.
//!
//! Each repository owns a connection handle and maps rows to the
//! `ledgerline-core` domain types. Mutations that touch a balance chain
//! run inside one database transaction holding the account row lock.

pub mod account;
pub mod category;
mod convert;
pub mod receipt;
pub mod transaction;

pub use account::AccountRepository;
pub use category::CategoryRepository;
pub use receipt::ReceiptRepository;
pub use transaction::TransactionRepository;
