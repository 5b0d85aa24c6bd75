//! Lease entity - the contractual relationship between a tenant and a unit
//! (optionally scoped to one bedroom)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lease lifecycle status
///
/// `Draft` is a reservation placeholder without finalized dates/rent.
/// `Moved` is terminal and kept for history after a tenant relocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeaseStatus {
    Draft,
    Active,
    Moved,
}

impl From<String> for LeaseStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Active" => LeaseStatus::Active,
            "MOVED" => LeaseStatus::Moved,
            _ => LeaseStatus::Draft,
        }
    }
}

impl From<LeaseStatus> for String {
    fn from(status: LeaseStatus) -> Self {
        match status {
            LeaseStatus::Draft => "DRAFT".to_string(),
            LeaseStatus::Active => "Active".to_string(),
            LeaseStatus::Moved => "MOVED".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "leases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub unit_id: Uuid,

    /// Null means the lease covers the whole unit
    pub bedroom_id: Option<Uuid>,

    pub tenant_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub start_date: Option<Date>,

    pub end_date: Option<Date>,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub monthly_rent: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub security_deposit: Decimal,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the lease status as an enum
    pub fn lease_status(&self) -> LeaseStatus {
        LeaseStatus::from(self.status.clone())
    }

    /// True when the lease covers the whole unit rather than one bedroom
    pub fn is_full_unit(&self) -> bool {
        self.bedroom_id.is_none()
    }

    /// Check if the lease is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.lease_status(), LeaseStatus::Moved)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::unit::Entity",
        from = "Column::UnitId",
        to = "super::unit::Column::Id"
    )]
    Unit,

    #[sea_orm(
        belongs_to = "super::bedroom::Entity",
        from = "Column::BedroomId",
        to = "super::bedroom::Column::Id"
    )]
    Bedroom,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::TenantId",
        to = "super::user::Column::Id"
    )]
    Tenant,

    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoices,
}

impl Related<super::unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unit.def()
    }
}

impl Related<super::bedroom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bedroom.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tenant.def()
    }
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(String::from(LeaseStatus::Draft), "DRAFT");
        assert_eq!(String::from(LeaseStatus::Active), "Active");
        assert_eq!(String::from(LeaseStatus::Moved), "MOVED");
        assert_eq!(LeaseStatus::from("MOVED".to_string()), LeaseStatus::Moved);
    }
}
