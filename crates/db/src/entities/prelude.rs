//! Entity re-exports.

pub use super::accounts::Entity as Accounts;
pub use super::categories::Entity as Categories;
pub use super::receipt_items::Entity as ReceiptItems;
pub use super::receipts::Entity as Receipts;
pub use super::transactions::Entity as Transactions;
