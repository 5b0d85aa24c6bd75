//! User entity - directory row for tenants, owners and staff
//!
//! Tenant rows carry denormalized `unit_id` / `bedroom_id` / `building_id`
//! fields mirroring the scope of the current Active (or most recent DRAFT)
//! lease. The Lease table is authoritative; these are convenience caches and
//! are written only by the occupancy engine, inside the same transaction as
//! the lease writes.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Directory role
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRole {
    Tenant,
    Owner,
    Admin,
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        match s.as_str() {
            "OWNER" => UserRole::Owner,
            "ADMIN" => UserRole::Admin,
            _ => UserRole::Tenant,
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::Tenant => "TENANT".to_string(),
            UserRole::Owner => "OWNER".to_string(),
            UserRole::Admin => "ADMIN".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub full_name: String,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub phone: Option<String>,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    /// Occupancy cache: unit of the current lease
    pub unit_id: Option<Uuid>,

    /// Occupancy cache: bedroom of the current lease (bedroom-wise only)
    pub bedroom_id: Option<Uuid>,

    /// Occupancy cache: property of the current lease
    pub building_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the role as an enum
    pub fn user_role(&self) -> UserRole {
        UserRole::from(self.role.clone())
    }

    pub fn is_tenant(&self) -> bool {
        self.user_role() == UserRole::Tenant
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::lease::Entity")]
    Leases,
}

impl Related<super::lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Leases.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
