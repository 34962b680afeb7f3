//! Account repository: account rows and anchor resets.

use chrono::Utc;
use ledgerline_core::ledger::{Account, AnchorReset, LedgerError, NewAccount};
use ledgerline_shared::types::AccountId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, QueryTrait, Set, TransactionTrait,
};
use tracing::debug;

use super::convert;
use super::transaction::{lock_account, release_receipts, resync};
use crate::entities::{accounts, receipts, transactions};
use crate::error::store_error;

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an account.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn create(&self, input: NewAccount) -> Result<Account, LedgerError> {
        let now = Utc::now().into();
        let row = accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            name: Set(input.name),
            bank: Set(input.bank),
            account_type: Set(input.account_type.into()),
            alias: Set(input.alias),
            anchor_date: Set(input.anchor_date),
            anchor_balance: Set(input.anchor_balance),
            anchor_currency: Set(input.anchor_currency.code().to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };
        convert::account(row.insert(&self.db).await.map_err(store_error)?)
    }

    /// Fetches an account.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or a store failure.
    pub async fn find(&self, id: AccountId) -> Result<Account, LedgerError> {
        accounts::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::AccountNotFound(id))
            .and_then(convert::account)
    }

    /// All accounts ordered by name.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn list(&self) -> Result<Vec<Account>, LedgerError> {
        accounts::Entity::find()
            .order_by_asc(accounts::Column::Name)
            .order_by_asc(accounts::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(convert::account)
            .collect()
    }

    /// Deletes an account; its transactions cascade and their receipts become unlinked.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or a store failure.
    pub async fn delete(&self, id: AccountId) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        lock_account(&txn, id).await?;

        let owned = transactions::Entity::find()
            .select_only()
            .column(transactions::Column::Id)
            .filter(transactions::Column::AccountId.eq(id.into_inner()))
            .into_query();
        let released =
            release_receipts(&txn, receipts::Column::TransactionId.in_subquery(owned)).await?;

        accounts::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(store_error)?;
        txn.commit().await.map_err(store_error)?;

        debug!(account_id = %id, released, "account deleted");
        Ok(())
    }

    /// Replaces the anchor and resyncs the chain in the same transaction.
    ///
    /// # Errors
    ///
    /// `AccountNotFound` or a store failure.
    pub async fn set_anchor(&self, id: AccountId, reset: AnchorReset) -> Result<Account, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let locked = lock_account(&txn, id).await?;

        let mut row: accounts::ActiveModel = locked.into();
        row.anchor_date = Set(reset.date);
        row.anchor_balance = Set(reset.balance);
        if let Some(currency) = reset.currency {
            row.anchor_currency = Set(currency.code().to_string());
        }
        row.updated_at = Set(Utc::now().into());
        let updated = row.update(&txn).await.map_err(store_error)?;

        resync(&txn, &updated).await?;
        txn.commit().await.map_err(store_error)?;
        convert::account(updated)
    }
}
