//! Repository pattern for database operations
//!
//! Provides a clean interface for inventory and directory data access with
//! proper error handling and transaction support. Occupancy-affecting writes
//! (unit/bedroom `status`, `rental_mode`, lease transitions, tenant caches)
//! are owned by the occupancy engine and deliberately absent here.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

/// Repository for inventory and directory data access
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Property Operations
    // ========================================================================

    /// Create a new property
    pub async fn create_property(
        &self,
        name: String,
        address_line: String,
        city: String,
        postal_code: Option<String>,
    ) -> Result<Property> {
        let now = chrono::Utc::now();

        let property = PropertyActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            address_line: Set(address_line),
            city: Set(city),
            postal_code: Set(postal_code),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        property.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find property by ID
    pub async fn find_property_by_id(&self, id: Uuid) -> Result<Option<Property>> {
        PropertyEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List all properties
    pub async fn list_properties(&self) -> Result<Vec<Property>> {
        PropertyEntity::find()
            .order_by_asc(PropertyColumn::Name)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete a property, explicitly cascading through its units, bedrooms,
    /// leases and invoices, and clearing affected tenant occupancy caches.
    /// All deletes share one transaction.
    pub async fn delete_property_cascade(&self, property_id: Uuid) -> Result<()> {
        let txn = self.write_conn().begin().await?;

        let property = PropertyEntity::find_by_id(property_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::PropertyNotFound {
                id: property_id.to_string(),
            })?;

        let units = UnitEntity::find()
            .filter(UnitColumn::PropertyId.eq(property_id))
            .all(&txn)
            .await?;

        for unit in &units {
            InvoiceEntity::delete_many()
                .filter(InvoiceColumn::UnitId.eq(unit.id))
                .exec(&txn)
                .await?;

            LeaseEntity::delete_many()
                .filter(LeaseColumn::UnitId.eq(unit.id))
                .exec(&txn)
                .await?;

            BedroomEntity::delete_many()
                .filter(BedroomColumn::UnitId.eq(unit.id))
                .exec(&txn)
                .await?;
        }

        // Tenants who lived anywhere in this building lose their cached scope
        UserEntity::update_many()
            .col_expr(UserColumn::UnitId, sea_orm::sea_query::Expr::value(Option::<Uuid>::None))
            .col_expr(UserColumn::BedroomId, sea_orm::sea_query::Expr::value(Option::<Uuid>::None))
            .col_expr(UserColumn::BuildingId, sea_orm::sea_query::Expr::value(Option::<Uuid>::None))
            .filter(UserColumn::BuildingId.eq(property_id))
            .exec(&txn)
            .await?;

        UnitEntity::delete_many()
            .filter(UnitColumn::PropertyId.eq(property_id))
            .exec(&txn)
            .await?;

        PropertyEntity::delete_by_id(property.id).exec(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            property_id = %property_id,
            units = units.len(),
            "Property deleted with cascade"
        );

        Ok(())
    }

    // ========================================================================
    // Unit Operations
    // ========================================================================

    /// Create a new unit under a property. New units start vacant in
    /// full-unit mode; the occupancy engine owns later status changes.
    pub async fn create_unit(
        &self,
        property_id: Uuid,
        unit_number: String,
        bedroom_count: i32,
        base_rent: Decimal,
    ) -> Result<Unit> {
        // Reject orphan units up front
        self.find_property_by_id(property_id)
            .await?
            .ok_or_else(|| AppError::PropertyNotFound {
                id: property_id.to_string(),
            })?;

        let now = chrono::Utc::now();

        let unit = UnitActiveModel {
            id: Set(Uuid::new_v4()),
            property_id: Set(property_id),
            unit_number: Set(unit_number),
            rental_mode: Set(String::from(RentalMode::FullUnit)),
            status: Set(String::from(UnitStatus::Vacant)),
            bedroom_count: Set(bedroom_count),
            base_rent: Set(base_rent),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        unit.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find unit by ID
    pub async fn find_unit_by_id(&self, id: Uuid) -> Result<Option<Unit>> {
        UnitEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List units for a property
    pub async fn list_units(&self, property_id: Uuid) -> Result<Vec<Unit>> {
        UnitEntity::find()
            .filter(UnitColumn::PropertyId.eq(property_id))
            .order_by_asc(UnitColumn::UnitNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Bedroom Operations
    // ========================================================================

    /// Create a bedroom under a unit
    pub async fn create_bedroom(
        &self,
        unit_id: Uuid,
        bedroom_number: String,
        room_number: i32,
        rent: Decimal,
    ) -> Result<Bedroom> {
        self.find_unit_by_id(unit_id)
            .await?
            .ok_or_else(|| AppError::UnitNotFound {
                id: unit_id.to_string(),
            })?;

        let now = chrono::Utc::now();

        let bedroom = BedroomActiveModel {
            id: Set(Uuid::new_v4()),
            unit_id: Set(unit_id),
            bedroom_number: Set(bedroom_number),
            room_number: Set(room_number),
            status: Set(String::from(BedroomStatus::Vacant)),
            rent: Set(rent),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        bedroom.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// List bedrooms for a unit, ordered by room number
    pub async fn list_bedrooms(&self, unit_id: Uuid) -> Result<Vec<Bedroom>> {
        BedroomEntity::find()
            .filter(BedroomColumn::UnitId.eq(unit_id))
            .order_by_asc(BedroomColumn::RoomNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // User / Tenant Directory Operations
    // ========================================================================

    /// Create a directory user
    pub async fn create_user(
        &self,
        full_name: String,
        email: String,
        phone: Option<String>,
        role: UserRole,
    ) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(full_name),
            email: Set(email),
            phone: Set(phone),
            role: Set(String::from(role)),
            unit_id: Set(None),
            bedroom_id: Set(None),
            building_id: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Lease Read Operations
    // ========================================================================

    /// Find lease by ID
    pub async fn find_lease_by_id(&self, id: Uuid) -> Result<Option<Lease>> {
        LeaseEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List leases for a unit, newest first
    pub async fn list_leases_by_unit(&self, unit_id: Uuid) -> Result<Vec<Lease>> {
        LeaseEntity::find()
            .filter(LeaseColumn::UnitId.eq(unit_id))
            .order_by_desc(LeaseColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List leases for a tenant, newest first
    pub async fn list_leases_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Lease>> {
        LeaseEntity::find()
            .filter(LeaseColumn::TenantId.eq(tenant_id))
            .order_by_desc(LeaseColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Invoice Read Operations
    // ========================================================================

    /// List invoices for a tenant, newest first
    pub async fn list_invoices_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<Invoice>> {
        InvoiceEntity::find()
            .filter(InvoiceColumn::TenantId.eq(tenant_id))
            .order_by_desc(InvoiceColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List invoices for a lease, newest first
    pub async fn list_invoices_by_lease(&self, lease_id: Uuid) -> Result<Vec<Invoice>> {
        InvoiceEntity::find()
            .filter(InvoiceColumn::LeaseId.eq(lease_id))
            .order_by_desc(InvoiceColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }
}
