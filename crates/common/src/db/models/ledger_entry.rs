//! Ledger entry entity - append-only audit ledger with a running balance

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of ledger entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Liability,
    Payment,
    Adjustment,
}

impl From<String> for EntryKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Payment" => EntryKind::Payment,
            "Adjustment" => EntryKind::Adjustment,
            _ => EntryKind::Liability,
        }
    }
}

impl From<EntryKind> for String {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Liability => "Liability".to_string(),
            EntryKind::Payment => "Payment".to_string(),
            EntryKind::Adjustment => "Adjustment".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub lease_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub kind: String,

    #[sea_orm(column_type = "Text")]
    pub memo: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,

    /// Running balance: previous entry's balance + amount
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub balance: Decimal,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TenantId",
        to = "super::user::Column::Id"
    )]
    Tenant,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
