//! Receipt repository: receipt rows, line items, and the exclusive link.

use chrono::Utc;
use ledgerline_core::ledger::LedgerError;
use ledgerline_core::receipt::{LinkStatus, NewReceipt, Receipt};
use ledgerline_shared::types::{ReceiptId, ReceiptItemId, TransactionId};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use super::convert;
use crate::entities::{
    receipt_items, receipts, sea_orm_active_enums::ReceiptLinkStatus, transactions,
};
use crate::error::{RECEIPT_LINK_CONSTRAINTS, store_error, violates};

/// Receipt repository.
#[derive(Debug, Clone)]
pub struct ReceiptRepository {
    db: DatabaseConnection,
}

impl ReceiptRepository {
    /// Creates a new receipt repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an unlinked receipt and its items.
    ///
    /// # Errors
    ///
    /// Returns a store failure.
    pub async fn create(&self, input: NewReceipt) -> Result<Receipt, LedgerError> {
        let id = ReceiptId::new();
        let now = Utc::now().into();
        let txn = self.db.begin().await.map_err(store_error)?;

        let receipt = receipts::ActiveModel {
            id: Set(id.into_inner()),
            transaction_id: Set(None),
            provider: Set(input.provider.into()),
            parse_status: Set(input.parse_status.into()),
            link_status: Set(ReceiptLinkStatus::Unlinked),
            merchant: Set(input.merchant),
            purchase_date: Set(input.purchase_date),
            total_amount: Set(input.total_amount),
            currency: Set(input.currency),
            match_suggestions: Set(convert::transaction_ids_json(&input.match_suggestions)),
            raw_payload: Set(input.raw_payload),
            canonical_data: Set(input.canonical_data),
            image_sha256: Set(input.image_sha256),
            image_key: Set(input.image_key),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(store_error)?;

        let mut items = Vec::with_capacity(input.items.len());
        for item in input.items {
            let row = receipt_items::ActiveModel {
                id: Set(ReceiptItemId::new().into_inner()),
                receipt_id: Set(receipt.id),
                line_no: Set(item.line_no),
                name: Set(item.name),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                line_total: Set(item.line_total),
                sku: Set(item.sku),
                category_hint: Set(item.category_hint),
            }
            .insert(&txn)
            .await
            .map_err(store_error)?;
            items.push(row);
        }

        txn.commit().await.map_err(store_error)?;
        convert::receipt(receipt, items)
    }

    /// Fetches a receipt with its items in line order.
    ///
    /// # Errors
    ///
    /// `ReceiptNotFound` or a store failure.
    pub async fn find(&self, id: ReceiptId) -> Result<Receipt, LedgerError> {
        fetch(&self.db, id).await
    }

    /// Deletes a receipt and its items, clearing the transaction back-reference.
    ///
    /// # Errors
    ///
    /// `ReceiptNotFound` or a store failure.
    pub async fn delete(&self, id: ReceiptId) -> Result<(), LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        clear_back_reference(&txn, id).await?;

        let result = receipts::Entity::delete_by_id(id.into_inner())
            .exec(&txn)
            .await
            .map_err(store_error)?;
        if result.rows_affected == 0 {
            return Err(LedgerError::ReceiptNotFound(id));
        }
        txn.commit().await.map_err(store_error)
    }

    /// Binds a receipt to a transaction under a row lock on the transaction.
    ///
    /// # Errors
    ///
    /// - `TransactionNotFound` / `ReceiptNotFound` if either row is absent
    /// - `ReceiptAlreadyLinked` if the transaction already carries a receipt
    /// - `ReceiptNotLinkable` if the receipt is already bound elsewhere
    pub async fn link(
        &self,
        transaction_id: TransactionId,
        receipt_id: ReceiptId,
        status: LinkStatus,
    ) -> Result<Receipt, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;

        let tx = transactions::Entity::find_by_id(transaction_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;
        if let Some(existing) = tx.receipt_id {
            return Err(LedgerError::ReceiptAlreadyLinked {
                transaction_id,
                existing: ReceiptId::from_uuid(existing),
            });
        }

        let receipt = receipts::Entity::find_by_id(receipt_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::ReceiptNotFound(receipt_id))?;
        if receipt.transaction_id.is_some() {
            return Err(LedgerError::ReceiptNotLinkable(receipt_id));
        }

        let now = Utc::now().into();
        let link_error = |err: sea_orm::DbErr| {
            if violates(&err, &RECEIPT_LINK_CONSTRAINTS) {
                LedgerError::ReceiptNotLinkable(receipt_id)
            } else {
                store_error(err)
            }
        };

        transactions::ActiveModel {
            id: Set(tx.id),
            receipt_id: Set(Some(receipt.id)),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(link_error)?;

        receipts::ActiveModel {
            id: Set(receipt.id),
            transaction_id: Set(Some(tx.id)),
            link_status: Set(status.into()),
            updated_at: Set(now),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(link_error)?;

        let linked = fetch(&txn, receipt_id).await?;
        txn.commit().await.map_err(store_error)?;
        Ok(linked)
    }

    /// Clears both sides of a link. A no-op for an unlinked receipt.
    ///
    /// Takes the transaction row lock before the receipt row lock, the same
    /// order as [`Self::link`].
    ///
    /// # Errors
    ///
    /// `ReceiptNotFound` or a store failure.
    pub async fn unlink(&self, receipt_id: ReceiptId) -> Result<Receipt, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;

        let current = receipts::Entity::find_by_id(receipt_id.into_inner())
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::ReceiptNotFound(receipt_id))?;
        let mut linked = Condition::any().add(transactions::Column::ReceiptId.eq(current.id));
        if let Some(tx_id) = current.transaction_id {
            linked = linked.add(transactions::Column::Id.eq(tx_id));
        }
        transactions::Entity::find()
            .filter(linked)
            .order_by_asc(transactions::Column::Id)
            .lock_exclusive()
            .all(&txn)
            .await
            .map_err(store_error)?;

        let receipt = receipts::Entity::find_by_id(receipt_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::ReceiptNotFound(receipt_id))?;

        if receipt.transaction_id.is_some() || receipt.link_status != ReceiptLinkStatus::Unlinked {
            clear_back_reference(&txn, receipt_id).await?;
            receipts::ActiveModel {
                id: Set(receipt.id),
                transaction_id: Set(None),
                link_status: Set(ReceiptLinkStatus::Unlinked),
                updated_at: Set(Utc::now().into()),
                ..Default::default()
            }
            .update(&txn)
            .await
            .map_err(store_error)?;
        }

        let unlinked = fetch(&txn, receipt_id).await?;
        txn.commit().await.map_err(store_error)?;
        Ok(unlinked)
    }
}

async fn fetch<C: ConnectionTrait>(conn: &C, id: ReceiptId) -> Result<Receipt, LedgerError> {
    let receipt = receipts::Entity::find_by_id(id.into_inner())
        .one(conn)
        .await
        .map_err(store_error)?
        .ok_or(LedgerError::ReceiptNotFound(id))?;
    let items = receipt_items::Entity::find()
        .filter(receipt_items::Column::ReceiptId.eq(receipt.id))
        .order_by_asc(receipt_items::Column::LineNo)
        .order_by_asc(receipt_items::Column::Id)
        .all(conn)
        .await
        .map_err(store_error)?;
    convert::receipt(receipt, items)
}

async fn clear_back_reference<C: ConnectionTrait>(
    conn: &C,
    receipt_id: ReceiptId,
) -> Result<(), LedgerError> {
    transactions::Entity::update_many()
        .col_expr(transactions::Column::ReceiptId, Expr::cust("NULL"))
        .col_expr(transactions::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(transactions::Column::ReceiptId.eq(receipt_id.into_inner()))
        .exec(conn)
        .await
        .map_err(store_error)?;
    Ok(())
}
