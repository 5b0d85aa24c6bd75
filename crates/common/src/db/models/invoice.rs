//! Invoice entity - billing record auto-created on lease activation

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invoice settlement status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Sent,
    PartiallyPaid,
    Paid,
    Void,
}

impl From<String> for InvoiceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "partially_paid" => InvoiceStatus::PartiallyPaid,
            "paid" => InvoiceStatus::Paid,
            "void" => InvoiceStatus::Void,
            _ => InvoiceStatus::Sent,
        }
    }
}

impl From<InvoiceStatus> for String {
    fn from(status: InvoiceStatus) -> Self {
        match status {
            InvoiceStatus::Sent => "sent".to_string(),
            InvoiceStatus::PartiallyPaid => "partially_paid".to_string(),
            InvoiceStatus::Paid => "paid".to_string(),
            InvoiceStatus::Void => "void".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Generated, unique (e.g. INV-LEASE-00042)
    #[sea_orm(column_type = "Text", unique)]
    pub invoice_no: String,

    pub tenant_id: Uuid,

    pub unit_id: Uuid,

    pub lease_id: Uuid,

    /// Calendar month label the invoice covers (e.g. "August 2026")
    #[sea_orm(column_type = "Text")]
    pub month: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub rent: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub fees: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub paid_amount: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub balance_due: Decimal,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub due_date: Date,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the invoice status as an enum
    pub fn invoice_status(&self) -> InvoiceStatus {
        InvoiceStatus::from(self.status.clone())
    }

    /// True while nothing has been collected against the invoice
    pub fn is_unpaid(&self) -> bool {
        matches!(self.invoice_status(), InvoiceStatus::Sent)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::lease::Entity",
        from = "Column::LeaseId",
        to = "super::lease::Column::Id"
    )]
    Lease,

    #[sea_orm(
        belongs_to = "super::unit::Entity",
        from = "Column::UnitId",
        to = "super::unit::Column::Id"
    )]
    Unit,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TenantId",
        to = "super::user::Column::Id"
    )]
    Tenant,
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Lease.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
