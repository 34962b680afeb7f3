//! In-process [`LedgerStore`] backed by a single mutex.
//!
//! Each operation runs under one lock acquisition, which makes every method
//! atomic and serializes concurrent receipt links the same way the row lock
//! does in Postgres. Used by tests and demos; nothing is persisted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use ledgerline_shared::types::{
    AccountId, CategoryId, Cursor, Money, ReceiptId, TransactionId,
};

use super::balance::{self, Anchor, ChainEntry};
use super::error::LedgerError;
use super::query::{TransactionFilter, compare_desc, is_below_cursor};
use super::store::{CategoryLookup, LedgerStore};
use super::types::{Account, AnchorReset, NewAccount, NewTransaction, Transaction, TransactionPatch};
use crate::receipt::matcher::CandidateWindow;
use crate::receipt::types::{LinkStatus, NewReceipt, Receipt};

#[derive(Debug, Default)]
struct State {
    accounts: HashMap<AccountId, Account>,
    transactions: HashMap<TransactionId, Transaction>,
    receipts: HashMap<ReceiptId, Receipt>,
    categories: HashMap<String, CategoryId>,
}

impl State {
    fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.accounts.get(&id).ok_or(LedgerError::AccountNotFound(id))
    }

    fn transaction(&self, id: TransactionId) -> Result<&Transaction, LedgerError> {
        self.transactions
            .get(&id)
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    fn receipt(&self, id: ReceiptId) -> Result<&Receipt, LedgerError> {
        self.receipts.get(&id).ok_or(LedgerError::ReceiptNotFound(id))
    }

    fn resync(&mut self, account_id: AccountId) -> Result<(), LedgerError> {
        let anchor = Anchor::from(self.account(account_id)?);
        let entries: Vec<ChainEntry> = self
            .transactions
            .values()
            .filter(|tx| tx.account_id == account_id)
            .map(ChainEntry::from)
            .collect();

        for (id, balance_after) in balance::recompute(&anchor, &entries)? {
            if let Some(tx) = self.transactions.get_mut(&id) {
                tx.balance_after = balance_after;
            }
        }
        Ok(())
    }

    fn ensure_unique_ref(&self, input: &NewTransaction) -> Result<(), LedgerError> {
        let Some(external_ref) = input.external_ref.as_deref() else {
            return Ok(());
        };
        let duplicate = self.transactions.values().any(|tx| {
            tx.account_id == input.account_id && tx.external_ref.as_deref() == Some(external_ref)
        });
        if duplicate {
            return Err(LedgerError::DuplicateTransaction {
                account_id: input.account_id,
                external_ref: external_ref.to_string(),
            });
        }
        Ok(())
    }

    fn release_receipt(&mut self, receipt_id: Option<ReceiptId>) {
        if let Some(receipt) = receipt_id.and_then(|id| self.receipts.get_mut(&id)) {
            receipt.transaction_id = None;
            receipt.link_status = LinkStatus::Unlinked;
            receipt.updated_at = Utc::now();
        }
    }

    fn remove_transaction(&mut self, id: TransactionId) -> Option<Transaction> {
        let removed = self.transactions.remove(&id)?;
        self.release_receipt(removed.receipt_id);
        Some(removed)
    }
}

/// Mutex-guarded in-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<State>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, LedgerError> {
        self.state
            .lock()
            .map_err(|_| LedgerError::Store("in-memory ledger lock poisoned".to_string()))
    }

    /// Registers a category slug for [`CategoryLookup`].
    pub fn add_category(&self, slug: &str) -> Result<CategoryId, LedgerError> {
        let id = CategoryId::new();
        self.lock()?.categories.insert(slug.to_lowercase(), id);
        Ok(id)
    }

    /// Number of stored receipts.
    pub fn receipt_count(&self) -> Result<usize, LedgerError> {
        Ok(self.lock()?.receipts.len())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    async fn create_account(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let now = Utc::now();
        let account = Account {
            id: AccountId::new(),
            name: input.name,
            bank: input.bank,
            account_type: input.account_type,
            alias: input.alias,
            anchor_date: input.anchor_date,
            anchor_balance: input.anchor_balance,
            anchor_currency: input.anchor_currency,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.lock()?.account(id).cloned()
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, LedgerError> {
        let mut accounts: Vec<Account> = self.lock()?.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(accounts)
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        state.account(id)?;
        let owned: Vec<TransactionId> = state
            .transactions
            .values()
            .filter(|tx| tx.account_id == id)
            .map(|tx| tx.id)
            .collect();
        for tx_id in owned {
            state.remove_transaction(tx_id);
        }
        state.accounts.remove(&id);
        Ok(())
    }

    async fn set_account_anchor(
        &self,
        id: AccountId,
        reset: AnchorReset,
    ) -> Result<Account, LedgerError> {
        let mut state = self.lock()?;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;
        let previous = account.clone();
        account.anchor_date = reset.date;
        account.anchor_balance = reset.balance;
        if let Some(currency) = reset.currency {
            account.anchor_currency = currency;
        }
        account.updated_at = Utc::now();
        let updated = account.clone();

        if let Err(err) = state.resync(id) {
            state.accounts.insert(id, previous);
            return Err(err);
        }
        Ok(updated)
    }

    async fn get_account_balance(&self, id: AccountId) -> Result<Money, LedgerError> {
        let state = self.lock()?;
        let account = state.account(id)?;
        let latest = state
            .transactions
            .values()
            .filter(|tx| tx.account_id == id)
            .max_by_key(|tx| (tx.tx_date, tx.id));
        Ok(balance::current_balance(account, latest))
    }

    async fn create_transaction(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut state = self.lock()?;
        state.account(input.account_id)?;
        state.ensure_unique_ref(&input)?;

        let account_id = input.account_id;
        let tx = input.into_transaction(TransactionId::new(), Utc::now());
        let id = tx.id;
        state.transactions.insert(id, tx);
        if let Err(err) = state.resync(account_id) {
            state.transactions.remove(&id);
            return Err(err);
        }
        state.transaction(id).cloned()
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.lock()?.transaction(id).cloned()
    }

    async fn update_transaction(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        let mut state = self.lock()?;
        let tx = state
            .transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        let resync = patch.requires_resync(tx);
        let previous = tx.clone();
        patch.apply_to(tx, Utc::now());
        let account_id = tx.account_id;

        if resync && let Err(err) = state.resync(account_id) {
            state.transactions.insert(id, previous);
            return Err(err);
        }
        state.transaction(id).cloned()
    }

    async fn delete_transaction(&self, id: TransactionId) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let removed = state
            .transactions
            .remove(&id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if let Err(err) = state.resync(removed.account_id) {
            state.transactions.insert(id, removed);
            return Err(err);
        }
        state.release_receipt(removed.receipt_id);
        Ok(())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
        after: Option<Cursor>,
        limit: u64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.lock()?;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .filter(|tx| after.as_ref().is_none_or(|c| is_below_cursor(tx, c)))
            .cloned()
            .collect();
        rows.sort_by(compare_desc);
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn find_candidate_transactions(
        &self,
        window: &CandidateWindow,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let state = self.lock()?;
        let mut rows: Vec<Transaction> = state
            .transactions
            .values()
            .filter(|tx| window.admits(tx))
            .cloned()
            .collect();
        rows.sort_by(compare_desc);
        Ok(rows)
    }

    async fn create_receipt(&self, input: NewReceipt) -> Result<Receipt, LedgerError> {
        let receipt = input.into_receipt(ReceiptId::new(), Utc::now());
        self.lock()?.receipts.insert(receipt.id, receipt.clone());
        Ok(receipt)
    }

    async fn get_receipt(&self, id: ReceiptId) -> Result<Receipt, LedgerError> {
        self.lock()?.receipt(id).cloned()
    }

    async fn delete_receipt(&self, id: ReceiptId) -> Result<(), LedgerError> {
        let mut state = self.lock()?;
        let removed = state
            .receipts
            .remove(&id)
            .ok_or(LedgerError::ReceiptNotFound(id))?;
        if let Some(tx) = removed
            .transaction_id
            .and_then(|tx_id| state.transactions.get_mut(&tx_id))
        {
            tx.receipt_id = None;
        }
        Ok(())
    }

    async fn link_receipt(
        &self,
        transaction_id: TransactionId,
        receipt_id: ReceiptId,
        status: LinkStatus,
    ) -> Result<Receipt, LedgerError> {
        let mut state = self.lock()?;
        if let Some(existing) = state.transaction(transaction_id)?.receipt_id {
            return Err(LedgerError::ReceiptAlreadyLinked {
                transaction_id,
                existing,
            });
        }
        if state.receipt(receipt_id)?.transaction_id.is_some() {
            return Err(LedgerError::ReceiptNotLinkable(receipt_id));
        }

        let now = Utc::now();
        if let Some(tx) = state.transactions.get_mut(&transaction_id) {
            tx.receipt_id = Some(receipt_id);
            tx.updated_at = now;
        }
        let receipt = state
            .receipts
            .get_mut(&receipt_id)
            .ok_or(LedgerError::ReceiptNotFound(receipt_id))?;
        receipt.transaction_id = Some(transaction_id);
        receipt.link_status = status;
        receipt.updated_at = now;
        Ok(receipt.clone())
    }

    async fn unlink_receipt(&self, receipt_id: ReceiptId) -> Result<Receipt, LedgerError> {
        let mut state = self.lock()?;
        let linked = state.receipt(receipt_id)?.transaction_id;
        if let Some(tx) = linked.and_then(|tx_id| state.transactions.get_mut(&tx_id)) {
            tx.receipt_id = None;
            tx.updated_at = Utc::now();
        }
        state.release_receipt(Some(receipt_id));
        state.receipt(receipt_id).cloned()
    }
}

impl CategoryLookup for InMemoryLedgerStore {
    async fn category_id_by_slug(&self, slug: &str) -> Result<Option<CategoryId>, LedgerError> {
        Ok(self.lock()?.categories.get(&slug.to_lowercase()).copied())
    }
}
