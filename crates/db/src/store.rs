//! Postgres-backed [`LedgerStore`].

use ledgerline_core::ledger::{
    Account, AnchorReset, CategoryLookup, LedgerError, LedgerStore, NewAccount, NewTransaction,
    Transaction, TransactionFilter, TransactionPatch, balance,
};
use ledgerline_core::receipt::{CandidateWindow, LinkStatus, NewReceipt, Receipt};
use ledgerline_shared::types::{AccountId, CategoryId, Cursor, Money, ReceiptId, TransactionId};
use sea_orm::DatabaseConnection;

use crate::repositories::{
    AccountRepository, CategoryRepository, ReceiptRepository, TransactionRepository,
};

/// The ledger store over a `SeaORM` connection pool.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    accounts: AccountRepository,
    transactions: TransactionRepository,
    receipts: ReceiptRepository,
    categories: CategoryRepository,
}

impl PgLedgerStore {
    /// Creates a store sharing one connection pool across repositories.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            accounts: AccountRepository::new(db.clone()),
            transactions: TransactionRepository::new(db.clone()),
            receipts: ReceiptRepository::new(db.clone()),
            categories: CategoryRepository::new(db),
        }
    }
}

impl LedgerStore for PgLedgerStore {
    async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        self.accounts.create(input).await
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts.find(id).await
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.accounts.list().await
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        self.accounts.delete(id).await
    }

    async fn set_account_anchor(
        &self,
        id: AccountId,
        reset: AnchorReset,
    ) -> Result<Account, LedgerError> {
        self.accounts.set_anchor(id, reset).await
    }

    async fn get_account_balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        let account = self.accounts.find(id).await?;
        let latest = self.transactions.latest(id).await?;
        Ok(balance::current_balance(&account, latest.as_ref()))
    }

    async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        self.transactions.create(input).await
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.transactions.find(id).await
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        self.transactions.update(id, patch).await
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), LedgerError> {
        self.transactions.delete(id).await
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        after: Option<Cursor>,
        limit: u64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.transactions.list(filter, after, limit).await
    }

    async fn find_candidate_transactions(
        &self,
        window: &CandidateWindow,
    ) -> Result<Vec<Transaction>, LedgerError> {
        self.transactions.candidates(window).await
    }

    async fn create_receipt(&self, input: NewReceipt) -> Result<Receipt, LedgerError> {
        self.receipts.create(input).await
    }

    async fn get_receipt(&self, id: ReceiptId) -> Result<Receipt, LedgerError> {
        self.receipts.find(id).await
    }

    async fn delete_receipt(&self, id: ReceiptId) -> Result<(), LedgerError> {
        self.receipts.delete(id).await
    }

    async fn link_receipt(
        &self,
        transaction_id: TransactionId,
        receipt_id: ReceiptId,
        status: LinkStatus,
    ) -> Result<Receipt, LedgerError> {
        self.receipts.link(transaction_id, receipt_id, status).await
    }

    async fn unlink_receipt(&self, receipt_id: ReceiptId) -> Result<Receipt, LedgerError> {
        self.receipts.unlink(receipt_id).await
    }
}

impl CategoryLookup for PgLedgerStore {
    async fn category_id_by_slug(&self, slug: &str) -> Result<Option<CategoryId>, LedgerError> {
        self.categories.find_id_by_slug(slug).await
    }
}
