//! Ledger service: validated entry points over a [`LedgerStore`].
//!
//! The store owns atomicity and balance resync; the service validates input,
//! parses caller filters, assembles pages, and logs completed mutations.

use std::sync::Arc;

use chrono::NaiveDate;
use ledgerline_shared::types::{AccountId, Currency, Money, Page, TransactionId};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::balance::accumulate;
use super::error::LedgerError;
use super::query::{RawTransactionQuery, TransactionQuery};
use super::store::{CategoryLookup, LedgerStore};
use super::types::{
    Account, AccountType, AnchorReset, BalanceSummary, NewAccount, NewTransaction, Transaction,
    TransactionPatch,
};
use super::validation::{validate_anchor, validate_new_account, validate_new_transaction, validate_patch};

/// Slug that means "no opinion" from a categorizer.
const UNCATEGORIZED_SLUG: &str = "other";

/// Ledger operations over a store.
pub struct LedgerService<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for LedgerService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: LedgerStore> LedgerService<S> {
    /// Creates a service over a shared store.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    // ========== Accounts ==========

    /// Creates an account.
    pub async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        validate_new_account(&input)?;
        let account = self.store.create_account(input).await?;
        info!(account_id = %account.id, name = %account.name, "account created");
        Ok(account)
    }

    /// Fetches an account.
    pub async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.store.get_account(id).await
    }

    /// Lists accounts.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        self.store.list_accounts().await
    }

    /// Deletes an account with its transactions.
    pub async fn delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        self.store.delete_account(id).await?;
        info!(account_id = %id, "account deleted");
        Ok(())
    }

    /// Redefines the account's known-true balance and rebases every transaction.
    pub async fn set_account_anchor(
        &self,
        id: AccountId,
        date: NaiveDate,
        balance: Decimal,
        currency: Option<Currency>,
    ) -> Result<Account, LedgerError> {
        let reset = AnchorReset {
            date,
            balance,
            currency,
        };
        validate_anchor(&reset)?;
        let account = self.store.set_account_anchor(id, reset).await?;
        info!(account_id = %id, anchor_date = %date, anchor_balance = %balance, "account anchor reset");
        Ok(account)
    }

    /// Current balance: the latest transaction's running balance, else the anchor.
    pub async fn get_account_balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        self.store.get_account_balance(id).await
    }

    /// Net balance and credit card debt across all accounts, per currency.
    pub async fn balance_summary(&self) -> Result<BalanceSummary, LedgerError> {
        let mut summary = BalanceSummary::default();
        for account in self.store.list_accounts().await? {
            let balance = self.store.get_account_balance(account.id).await?;
            accumulate(&mut summary.net, balance.currency, balance.amount);
            if account.account_type == AccountType::CreditCard && balance.is_negative() {
                accumulate(&mut summary.credit_card_debt, balance.currency, -balance.amount);
            }
        }
        Ok(summary)
    }

    // ========== Transactions ==========

    /// Records a transaction and resyncs its account.
    pub async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        validate_new_transaction(&input)?;
        let tx = self.store.create_transaction(input).await?;
        info!(
            transaction_id = %tx.id,
            account_id = %tx.account_id,
            amount = %tx.amount,
            direction = %tx.direction,
            balance_after = %tx.balance_after,
            "transaction created"
        );
        Ok(tx)
    }

    /// Fetches a transaction.
    pub async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.store.get_transaction(id).await
    }

    /// Applies an update descriptor.
    pub async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        validate_patch(&patch)?;
        let tx = self.store.update_transaction(id, patch).await?;
        info!(transaction_id = %id, balance_after = %tx.balance_after, "transaction updated");
        Ok(tx)
    }

    /// Deletes a transaction and resyncs its account.
    pub async fn delete_transaction(&self, id: TransactionId) -> Result<(), LedgerError> {
        self.store.delete_transaction(id).await?;
        info!(transaction_id = %id, "transaction deleted");
        Ok(())
    }

    /// Lists one page of transactions, newest first.
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Page<Transaction>, LedgerError> {
        query.filter.validate()?;
        let rows = self
            .store
            .list_transactions(&query.filter, query.page.cursor, query.page.fetch_limit())
            .await?;
        debug!(fetched = rows.len(), limit = query.page.limit(), "transactions listed");
        Ok(Page::from_overfetch(rows, &query.page, Transaction::cursor))
    }

    /// Parses caller-supplied string filters, then lists.
    pub async fn list_transactions_raw(
        &self,
        raw: RawTransactionQuery,
    ) -> Result<Page<Transaction>, LedgerError> {
        let query = TransactionQuery::try_from(raw)?;
        self.list_transactions(&query).await
    }

    /// Stores a categorizer's pick and hints on a transaction.
    ///
    /// Unknown slugs and `other` leave the category empty but still keep the hints.
    /// Never triggers a resync.
    pub async fn apply_category_suggestion<C: CategoryLookup>(
        &self,
        categories: &C,
        id: TransactionId,
        slug: &str,
        suggestions: Vec<String>,
    ) -> Result<Transaction, LedgerError> {
        let slug = slug.trim().to_lowercase();
        let category_id = if slug.is_empty() || slug == UNCATEGORIZED_SLUG {
            None
        } else {
            let found = categories.category_id_by_slug(&slug).await?;
            if found.is_none() {
                warn!(transaction_id = %id, slug = %slug, "unknown category slug");
            }
            found
        };

        let patch = TransactionPatch {
            category_id: Some(category_id),
            suggestions: Some(suggestions),
            ..TransactionPatch::default()
        };
        self.store.update_transaction(id, patch).await
    }
}
