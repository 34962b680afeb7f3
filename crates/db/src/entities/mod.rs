//! `SeaORM` entity definitions.
//!
//! Hand-written to match the initial migration; column names equal field names.

pub mod prelude;

pub mod accounts;
pub mod categories;
pub mod receipt_items;
pub mod receipts;
pub mod sea_orm_active_enums;
pub mod transactions;
