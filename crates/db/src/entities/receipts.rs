//! `SeaORM` Entity for receipts table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{ReceiptLinkStatus, ReceiptParseStatus, ReceiptProvider};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "receipts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_id: Option<Uuid>,
    pub provider: ReceiptProvider,
    pub parse_status: ReceiptParseStatus,
    pub link_status: ReceiptLinkStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub merchant: Option<String>,
    pub purchase_date: Option<Date>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub total_amount: Option<Decimal>,
    pub currency: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub match_suggestions: Json,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub raw_payload: Option<Json>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub canonical_data: Option<Json>,
    pub image_sha256: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub image_key: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::receipt_items::Entity")]
    ReceiptItems,
}

impl Related<super::receipt_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ReceiptItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
