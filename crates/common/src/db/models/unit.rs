//! Unit entity - a rentable entity within a property

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Occupancy status of a unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitStatus {
    Vacant,
    Occupied,
    FullyBooked,
}

impl From<String> for UnitStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Occupied" => UnitStatus::Occupied,
            "Fully Booked" => UnitStatus::FullyBooked,
            _ => UnitStatus::Vacant,
        }
    }
}

impl From<UnitStatus> for String {
    fn from(status: UnitStatus) -> Self {
        match status {
            UnitStatus::Vacant => "Vacant".to_string(),
            UnitStatus::Occupied => "Occupied".to_string(),
            UnitStatus::FullyBooked => "Fully Booked".to_string(),
        }
    }
}

/// Whether the unit is leased as one whole or per-bedroom
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RentalMode {
    FullUnit,
    BedroomWise,
}

impl From<String> for RentalMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "BEDROOM_WISE" => RentalMode::BedroomWise,
            _ => RentalMode::FullUnit,
        }
    }
}

impl From<RentalMode> for String {
    fn from(mode: RentalMode) -> Self {
        match mode {
            RentalMode::FullUnit => "FULL_UNIT".to_string(),
            RentalMode::BedroomWise => "BEDROOM_WISE".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "units")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub property_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub unit_number: String,

    #[sea_orm(column_type = "Text")]
    pub rental_mode: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    pub bedroom_count: i32,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub base_rent: Decimal,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the occupancy status as an enum
    pub fn unit_status(&self) -> UnitStatus {
        UnitStatus::from(self.status.clone())
    }

    /// Get the rental mode as an enum
    pub fn mode(&self) -> RentalMode {
        RentalMode::from(self.rental_mode.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::property::Entity",
        from = "Column::PropertyId",
        to = "super::property::Column::Id"
    )]
    Property,

    #[sea_orm(has_many = "super::bedroom::Entity")]
    Bedrooms,

    #[sea_orm(has_many = "super::lease::Entity")]
    Leases,
}

impl Related<super::property::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Property.def()
    }
}

impl Related<super::bedroom::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bedrooms.def()
    }
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Leases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        assert_eq!(UnitStatus::from(String::from(UnitStatus::FullyBooked)), UnitStatus::FullyBooked);
        assert_eq!(String::from(UnitStatus::FullyBooked), "Fully Booked");
        // Unknown strings fall back to Vacant
        assert_eq!(UnitStatus::from("garbage".to_string()), UnitStatus::Vacant);
    }

    #[test]
    fn test_rental_mode_strings() {
        assert_eq!(String::from(RentalMode::BedroomWise), "BEDROOM_WISE");
        assert_eq!(RentalMode::from("FULL_UNIT".to_string()), RentalMode::FullUnit);
    }
}
