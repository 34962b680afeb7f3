//! Transaction repository: mutations with balance resync, filtered listing,
//! and receipt candidate search.
//!
//! Every mutation runs in one database transaction that first takes a row lock
//! on the owning account. Concurrent writers on the same account therefore
//! serialize, and the full-chain resync always sees a stable chain.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use ledgerline_core::ledger::balance::{self, Anchor, ChainEntry};
use ledgerline_core::ledger::{
    Direction, LedgerError, NewTransaction, Transaction, TransactionFilter, TransactionPatch,
};
use ledgerline_core::receipt::CandidateWindow;
use ledgerline_shared::types::{AccountId, Cursor, TransactionId};
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use super::convert;
use crate::entities::{
    accounts, receipts,
    sea_orm_active_enums::{ReceiptLinkStatus, TxDirection},
    transactions,
};
use crate::error::{TRANSACTION_REF_CONSTRAINT, store_error, violates};

/// Transaction repository.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    db: DatabaseConnection,
}

impl TransactionRepository {
    /// Creates a new transaction repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts a transaction and resyncs its account.
    ///
    /// # Errors
    ///
    /// `AccountNotFound`, `DuplicateTransaction` on a repeated external ref, or a store failure.
    pub async fn create(&self, input: NewTransaction) -> Result<Transaction, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        let account = lock_account(&txn, input.account_id).await?;

        let id = TransactionId::new();
        let now = Utc::now();
        let row = transactions::ActiveModel {
            id: Set(id.into_inner()),
            account_id: Set(account.id),
            external_ref: Set(input.external_ref.clone()),
            tx_date: Set(input.tx_date.into()),
            tx_amount: Set(input.amount),
            tx_currency: Set(input.currency.code().to_string()),
            tx_direction: Set(input.direction.into()),
            description: Set(input.description),
            merchant: Set(input.merchant),
            user_notes: Set(input.user_notes),
            category_id: Set(input.category_id.map(|c| c.into_inner())),
            balance_after: Set(Decimal::ZERO),
            receipt_id: Set(None),
            suggestions: Set(convert::suggestions_json(&input.suggestions)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        if let Err(err) = row.insert(&txn).await {
            if violates(&err, &[TRANSACTION_REF_CONSTRAINT]) {
                return Err(LedgerError::DuplicateTransaction {
                    account_id: input.account_id,
                    external_ref: input.external_ref.unwrap_or_default(),
                });
            }
            return Err(store_error(err));
        }

        resync(&txn, &account).await?;
        let created = fetch(&txn, id).await?;
        txn.commit().await.map_err(store_error)?;
        Ok(created)
    }

    /// Fetches a transaction.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` or a store failure.
    pub async fn find(&self, id: TransactionId) -> Result<Transaction, LedgerError> {
        fetch(&self.db, id).await
    }

    /// Applies a patch, resyncing only when it moves the chain.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` or a store failure.
    pub async fn update(
        &self,
        id: TransactionId,
        patch: TransactionPatch,
    ) -> Result<Transaction, LedgerError> {
        let account_id = fetch(&self.db, id).await?.account_id;

        let txn = self.db.begin().await.map_err(store_error)?;
        let account = lock_account(&txn, account_id).await?;
        let mut current = fetch(&txn, id).await?;

        let needs_resync = patch.requires_resync(&current);
        patch.apply_to(&mut current, Utc::now());

        transactions::ActiveModel {
            id: Set(current.id.into_inner()),
            tx_date: Set(current.tx_date.into()),
            tx_amount: Set(current.amount),
            tx_currency: Set(current.currency.code().to_string()),
            tx_direction: Set(current.direction.into()),
            description: Set(current.description.clone()),
            merchant: Set(current.merchant.clone()),
            user_notes: Set(current.user_notes.clone()),
            category_id: Set(current.category_id.map(|c| c.into_inner())),
            suggestions: Set(convert::suggestions_json(&current.suggestions)),
            updated_at: Set(current.updated_at.into()),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_error)?;

        if needs_resync {
            resync(&txn, &account).await?;
        }
        let updated = fetch(&txn, id).await?;
        txn.commit().await.map_err(store_error)?;
        Ok(updated)
    }

    /// Deletes a transaction, unlinking its receipt, and resyncs the account.
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` or a store failure.
    pub async fn delete(&self, id: TransactionId) -> Result<(), LedgerError> {
        let account_id = fetch(&self.db, id).await?.account_id;

        let txn = self.db.begin().await.map_err(store_error)?;
        let account = lock_account(&txn, account_id).await?;
        transactions::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::TransactionNotFound(id))?;

        release_receipts(
            &txn,
            receipts::Column::TransactionId.eq(id.into_inner()),
        )
        .await?;

        let result = transactions::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(store_error)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::TransactionNotFound(id));
        }

        resync(&txn, &account).await?;
        txn.commit().await.map_err(store_error)
    }

    /// Up to `limit` rows matching `filter`, strictly below `after`, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
        after: Option<Cursor>,
        limit: u64,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let mut condition = filter_condition(filter);
        if let Some(cursor) = after {
            condition = condition.add(below_cursor(&cursor));
        }

        transactions::Entity::find()
            .filter(condition)
            .order_by_desc(transactions::Column::TxDate)
            .order_by_desc(transactions::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(store_error)?
            .into_iter()
            .map(convert::transaction)
            .collect()
    }

    /// Unlinked outgoing transactions inside the receipt window, newest first.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn candidates(&self, window: &CandidateWindow) -> Result<Vec<Transaction>, LedgerError> {
        let mut condition = Condition::all()
            .add(transactions::Column::ReceiptId.is_null())
            .add(transactions::Column::TxDirection.eq(TxDirection::Out))
            .add(transactions::Column::TxDate.gte(start_of_day(window.earliest)))
            .add(transactions::Column::TxAmount.gte(window.min_amount))
            .add(transactions::Column::TxAmount.lte(window.max_amount));
        if let Some(end) = end_of_day(window.latest) {
            condition = condition.add(transactions::Column::TxDate.lt(end));
        }

        let rows = transactions::Entity::find()
            .filter(condition)
            .order_by_desc(transactions::Column::TxDate)
            .order_by_desc(transactions::Column::Id)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        debug!(candidates = rows.len(), "receipt candidate rows fetched");
        rows.into_iter().map(convert::transaction).collect()
    }

    /// The newest transaction on an account, if any.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn latest(&self, account_id: AccountId) -> Result<Option<Transaction>, LedgerError> {
        transactions::Entity::find()
            .filter(transactions::Column::AccountId.eq(account_id.into_inner()))
            .order_by_desc(transactions::Column::TxDate)
            .order_by_desc(transactions::Column::Id)
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(convert::transaction)
            .transpose()
    }
}

/// Loads an account row under `SELECT ... FOR UPDATE`.
pub(crate) async fn lock_account(
    txn: &DatabaseTransaction,
    id: AccountId,
) -> Result<accounts::Model, LedgerError> {
    accounts::Entity::find_by_id(id.into_inner())
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(store_error)?
        .ok_or(LedgerError::AccountNotFound(id))
}

async fn fetch<C: ConnectionTrait>(conn: &C, id: TransactionId) -> Result<Transaction, LedgerError> {
    transactions::Entity::find_by_id(id.into_inner())
        .one(conn)
        .await
        .map_err(store_error)?
        .ok_or(LedgerError::TransactionNotFound(id))
        .and_then(convert::transaction)
}

/// Returns matching receipts to `unlinked` and clears their transaction reference.
pub(crate) async fn release_receipts<C: ConnectionTrait>(
    conn: &C,
    which: sea_orm::sea_query::SimpleExpr,
) -> Result<u64, LedgerError> {
    let result = receipts::Entity::update_many()
        .col_expr(receipts::Column::TransactionId, Expr::cust("NULL"))
        .col_expr(receipts::Column::LinkStatus, ReceiptLinkStatus::Unlinked.as_enum())
        .col_expr(receipts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(which)
        .exec(conn)
        .await
        .map_err(store_error)?;
    Ok(result.rows_affected)
}

/// Recomputes `balance_after` for the whole chain of `account`, writing only changed rows.
///
/// The caller must hold the account row lock.
pub(crate) async fn resync<C: ConnectionTrait>(
    conn: &C,
    account: &accounts::Model,
) -> Result<usize, LedgerError> {
    let rows: Vec<(Uuid, DateTime<chrono::FixedOffset>, Decimal, TxDirection, Decimal)> =
        transactions::Entity::find()
            .select_only()
            .column(transactions::Column::Id)
            .column(transactions::Column::TxDate)
            .column(transactions::Column::TxAmount)
            .column(transactions::Column::TxDirection)
            .column(transactions::Column::BalanceAfter)
            .filter(transactions::Column::AccountId.eq(account.id))
            .into_tuple()
            .all(conn)
            .await
            .map_err(store_error)?;

    let mut cached = HashMap::with_capacity(rows.len());
    let entries: Vec<ChainEntry> = rows
        .into_iter()
        .map(|(id, tx_date, amount, direction, balance_after)| {
            let id = TransactionId::from_uuid(id);
            cached.insert(id, balance_after);
            ChainEntry {
                id,
                tx_date: tx_date.with_timezone(&Utc),
                signed_amount: Direction::from(direction).signed(amount),
            }
        })
        .collect();

    let anchor = Anchor {
        date: account.anchor_date,
        balance: account.anchor_balance,
    };

    let mut changed = 0;
    for (id, balance_after) in balance::recompute(&anchor, &entries)? {
        if cached.get(&id) == Some(&balance_after) {
            continue;
        }
        transactions::Entity::update_many()
            .col_expr(transactions::Column::BalanceAfter, Expr::value(balance_after))
            .filter(transactions::Column::Id.eq(id.into_inner()))
            .exec(conn)
            .await
            .map_err(store_error)?;
        changed += 1;
    }

    debug!(account_id = %account.id, chain = entries.len(), changed, "balance chain resynced");
    Ok(changed)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.checked_add_signed(Duration::days(1)).map(start_of_day)
}

/// `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn contains_folded(column: transactions::Column, needle: &str) -> sea_orm::sea_query::SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column)))
        .like(LikeExpr::new(contains_pattern(needle)).escape('\\'))
}

const UTC_TIME_OF_DAY: &str = "(tx_date AT TIME ZONE 'UTC')::time";

fn time_window(from: Option<NaiveTime>, to: Option<NaiveTime>) -> Option<Condition> {
    let after = |t: NaiveTime| Expr::cust_with_values(format!("{UTC_TIME_OF_DAY} >= $1"), [t]);
    let before = |t: NaiveTime| Expr::cust_with_values(format!("{UTC_TIME_OF_DAY} <= $1"), [t]);
    match (from, to) {
        (None, None) => None,
        (Some(from), None) => Some(Condition::all().add(after(from))),
        (None, Some(to)) => Some(Condition::all().add(before(to))),
        (Some(from), Some(to)) if from <= to => {
            Some(Condition::all().add(after(from)).add(before(to)))
        }
        (Some(from), Some(to)) => Some(Condition::any().add(after(from)).add(before(to))),
    }
}

/// SQL rendition of [`TransactionFilter::matches`].
pub(crate) fn filter_condition(filter: &TransactionFilter) -> Condition {
    let mut condition = Condition::all();

    if let Some(from) = filter.date_from {
        condition = condition.add(transactions::Column::TxDate.gte(start_of_day(from)));
    }
    if let Some(end) = filter.date_to.and_then(end_of_day) {
        condition = condition.add(transactions::Column::TxDate.lt(end));
    }
    if let Some(min) = filter.amount_min {
        condition = condition.add(transactions::Column::TxAmount.gte(min));
    }
    if let Some(max) = filter.amount_max {
        condition = condition.add(transactions::Column::TxAmount.lte(max));
    }
    if let Some(direction) = filter.direction {
        condition = condition.add(transactions::Column::TxDirection.eq(TxDirection::from(direction)));
    }
    if let Some(currency) = filter.currency {
        condition = condition.add(transactions::Column::TxCurrency.eq(currency.code()));
    }
    if !filter.category_ids.is_empty() {
        condition = condition.add(
            transactions::Column::CategoryId
                .is_in(filter.category_ids.iter().map(|c| c.into_inner())),
        );
    }
    if !filter.account_ids.is_empty() {
        condition = condition.add(
            transactions::Column::AccountId.is_in(filter.account_ids.iter().map(|a| a.into_inner())),
        );
    }
    if let Some(needle) = filter.merchant_contains.as_deref() {
        condition = condition.add(contains_folded(transactions::Column::Merchant, needle));
    }
    if let Some(needle) = filter.description_contains.as_deref() {
        condition = condition.add(contains_folded(transactions::Column::Description, needle));
    }
    if let Some(window) = time_window(filter.time_from, filter.time_to) {
        condition = condition.add(window);
    }
    condition
}

/// Keyset predicate: `(tx_date, id) < (cursor.date, cursor.id)`.
pub(crate) fn below_cursor(cursor: &Cursor) -> Condition {
    Condition::any()
        .add(transactions::Column::TxDate.lt(cursor.date))
        .add(
            Condition::all()
                .add(transactions::Column::TxDate.eq(cursor.date))
                .add(transactions::Column::Id.lt(cursor.id)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    fn sql(filter: &TransactionFilter) -> String {
        transactions::Entity::find()
            .filter(filter_condition(filter))
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn test_contains_pattern_escapes_wildcards() {
        assert_eq!(contains_pattern("Tim"), "%tim%");
        assert_eq!(contains_pattern("100%_off"), "%100\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_empty_filter_has_no_predicates() {
        assert!(!sql(&TransactionFilter::default()).contains("WHERE"));
    }

    #[test]
    fn test_date_range_is_half_open_on_next_day() {
        let filter = TransactionFilter {
            date_from: NaiveDate::from_ymd_opt(2025, 7, 1),
            date_to: NaiveDate::from_ymd_opt(2025, 7, 31),
            ..TransactionFilter::default()
        };
        let sql = sql(&filter);
        assert!(sql.contains("\"tx_date\" >= '2025-07-01 00:00:00"));
        assert!(sql.contains("\"tx_date\" < '2025-08-01 00:00:00"));
    }

    #[test]
    fn test_wrapping_time_window_uses_or() {
        let filter = TransactionFilter {
            time_from: NaiveTime::from_hms_opt(22, 0, 0),
            time_to: NaiveTime::from_hms_opt(2, 0, 0),
            ..TransactionFilter::default()
        };
        let sql = sql(&filter);
        assert!(sql.contains("AT TIME ZONE 'UTC'"));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_substring_filters_lowercase() {
        let filter = TransactionFilter {
            merchant_contains: Some("Costco".into()),
            ..TransactionFilter::default()
        };
        let sql = sql(&filter);
        assert!(sql.contains("LOWER(\"merchant\") LIKE '%costco%'"));
    }

    #[test]
    fn test_cursor_predicate_breaks_ties_on_id() {
        let cursor = Cursor::new(Utc::now(), Uuid::now_v7());
        let sql = transactions::Entity::find()
            .filter(below_cursor(&cursor))
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains("\"tx_date\" <"));
        assert!(sql.contains("\"id\" <"));
        assert!(sql.contains(" OR "));
    }
}
