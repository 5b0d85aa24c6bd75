//! Bedroom entity - a sub-unit relevant under BEDROOM_WISE rental mode

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Occupancy status of a bedroom
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BedroomStatus {
    Vacant,
    Occupied,
}

impl From<String> for BedroomStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Occupied" => BedroomStatus::Occupied,
            _ => BedroomStatus::Vacant,
        }
    }
}

impl From<BedroomStatus> for String {
    fn from(status: BedroomStatus) -> Self {
        match status {
            BedroomStatus::Vacant => "Vacant".to_string(),
            BedroomStatus::Occupied => "Occupied".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bedrooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub unit_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub bedroom_number: String,

    /// Ordering within the unit
    pub room_number: i32,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub rent: Decimal,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the occupancy status as an enum
    pub fn bedroom_status(&self) -> BedroomStatus {
        BedroomStatus::from(self.status.clone())
    }

    pub fn is_vacant(&self) -> bool {
        self.bedroom_status() == BedroomStatus::Vacant
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

    #[sea_orm(has_many = "super::lease::Entity")]
    Leases,
}

impl Related<super::unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unit.def()
    }
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Leases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
