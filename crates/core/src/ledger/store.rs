//! Storage seams implemented outside the core.
//!
//! `ledgerline-db` provides the Postgres implementation; [`super::memory`]
//! provides an in-process one for tests. Every mutating method is atomic:
//! the write, any balance resync it requires, and any exclusivity check all
//! commit together or not at all.

use ledgerline_shared::types::{AccountId, CategoryId, Cursor, Money, ReceiptId, TransactionId};

use super::error::LedgerError;
use super::query::TransactionFilter;
use super::types::{Account, AnchorReset, NewAccount, NewTransaction, Transaction, TransactionPatch};
use crate::receipt::matcher::CandidateWindow;
use crate::receipt::types::{LinkStatus, NewReceipt, Receipt};

/// Durable storage for accounts, transactions, and receipts.
pub trait LedgerStore: Send + Sync {
    /// Inserts an account.
    fn create_account(
        &self,
        input: NewAccount,
    ) -> impl std::future::Future<Output = Result<Account, LedgerError>> + Send;

    /// Fetches an account.
    fn get_account(
        &self,
        id: AccountId,
    ) -> impl std::future::Future<Output = Result<Account, LedgerError>> + Send;

    /// Lists all accounts by name.
    fn list_accounts(&self) -> impl std::future::Future<Output = Result<Vec<Account>, LedgerError>> + Send;

    /// Deletes an account and its transactions. Receipts linked to them become unlinked.
    fn delete_account(
        &self,
        id: AccountId,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Replaces the anchor and resyncs the account's chain.
    fn set_account_anchor(
        &self,
        id: AccountId,
        reset: AnchorReset,
    ) -> impl std::future::Future<Output = Result<Account, LedgerError>> + Send;

    /// Balance after the latest transaction, or the anchor balance when there is none.
    fn get_account_balance(
        &self,
        id: AccountId,
    ) -> impl std::future::Future<Output = Result<Money, LedgerError>> + Send;

    /// Inserts a transaction and resyncs its account.
    fn create_transaction(
        &self,
        input: NewTransaction,
    ) -> impl std::future::Future<Output = Result<Transaction, LedgerError>> + Send;

    /// Fetches a transaction.
    fn get_transaction(
        &self,
        id: TransactionId,
    ) -> impl std::future::Future<Output = Result<Transaction, LedgerError>> + Send;

    /// Applies a patch, resyncing only when the patch moves the chain.
    fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> impl std::future::Future<Output = Result<Transaction, LedgerError>> + Send;

    /// Deletes a transaction and resyncs its account.
    fn delete_transaction(
        &self,
        id: TransactionId,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Up to `limit` matching rows strictly below `after`, newest first.
    fn list_transactions(
        &self,
        filter: &TransactionFilter,
        after: Option<Cursor>,
        limit: u64,
    ) -> impl std::future::Future<Output = Result<Vec<Transaction>, LedgerError>> + Send;

    /// Transactions passing the coarse receipt-candidate filter.
    fn find_candidate_transactions(
        &self,
        window: &CandidateWindow,
    ) -> impl std::future::Future<Output = Result<Vec<Transaction>, LedgerError>> + Send;

    /// Inserts an unlinked receipt with its items.
    fn create_receipt(
        &self,
        input: NewReceipt,
    ) -> impl std::future::Future<Output = Result<Receipt, LedgerError>> + Send;

    /// Fetches a receipt with its items.
    fn get_receipt(
        &self,
        id: ReceiptId,
    ) -> impl std::future::Future<Output = Result<Receipt, LedgerError>> + Send;

    /// Deletes a receipt and its items, clearing any transaction back-reference.
    fn delete_receipt(
        &self,
        id: ReceiptId,
    ) -> impl std::future::Future<Output = Result<(), LedgerError>> + Send;

    /// Binds a receipt to a transaction under a lock on the transaction row.
    ///
    /// Fails with [`LedgerError::ReceiptAlreadyLinked`] when the transaction
    /// already carries a receipt.
    fn link_receipt(
        &self,
        transaction_id: TransactionId,
        receipt_id: ReceiptId,
        status: LinkStatus,
    ) -> impl std::future::Future<Output = Result<Receipt, LedgerError>> + Send;

    /// Clears both sides of a receipt link.
    fn unlink_receipt(
        &self,
        receipt_id: ReceiptId,
    ) -> impl std::future::Future<Output = Result<Receipt, LedgerError>> + Send;
}

/// Resolves category slugs for categorization suggestions.
pub trait CategoryLookup: Send + Sync {
    /// Category ID for a slug, `None` if unknown.
    fn category_id_by_slug(
        &self,
        slug: &str,
    ) -> impl std::future::Future<Output = Result<Option<CategoryId>, LedgerError>> + Send;
}
