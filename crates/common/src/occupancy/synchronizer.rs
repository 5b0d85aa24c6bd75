//! Occupancy synchronizer
//!
//! For every lease transition: open one transaction, lock and snapshot the
//! unit, consult the state machine, validate against current occupancy,
//! apply the planned writes (unit/bedroom status, tenant cache, first
//! invoice, deposit ledger entry) and commit. A failure at any point rolls
//! the whole operation back.

use crate::config::BillingConfig;
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::occupancy::billing;
use crate::occupancy::snapshot::{
    plan_apply, plan_unwind, validate_create, ApplyPlan, LeaseScope, OccupancySnapshot, UnwindPlan,
};
use crate::occupancy::state_machine::{transition, LeaseOp, Transition};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, ModelTrait,
    QueryFilter, sea_query::Expr, Set, Statement, TransactionTrait,
};
use uuid::Uuid;

/// Input for creating a lease.
///
/// When dates and rent are supplied the lease is created Active and
/// occupancy is applied immediately; otherwise a DRAFT reservation is
/// created (or an existing one for the same unit+tenant is reused).
#[derive(Clone, Debug)]
pub struct CreateLeaseInput {
    pub unit_id: Uuid,
    pub tenant_id: Uuid,
    /// None means the lease covers the whole unit
    pub bedroom_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Option<Decimal>,
    pub security_deposit: Option<Decimal>,
}

/// The transactional lease/occupancy service
#[derive(Clone)]
pub struct OccupancyService {
    pool: DbPool,
    billing: BillingConfig,
}

impl OccupancyService {
    pub fn new(pool: DbPool, billing: BillingConfig) -> Self {
        Self { pool, billing }
    }

    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub(crate) fn billing(&self) -> &BillingConfig {
        &self.billing
    }

    /// Create a lease (DRAFT reservation or directly Active).
    ///
    /// Reuses an existing DRAFT for the same (unit, tenant) instead of
    /// creating a duplicate.
    pub async fn create_lease(&self, input: CreateLeaseInput) -> Result<Lease> {
        let txn = self.pool.write().begin().await?;

        let tenant = require_tenant(&txn, input.tenant_id).await?;
        let snap = OccupancySnapshot::load(&txn, input.unit_id).await?;
        let scope = LeaseScope::from_bedroom(input.bedroom_id);

        let existing_draft = snap
            .leases
            .iter()
            .find(|l| l.lease_status() == LeaseStatus::Draft && l.tenant_id == tenant.id)
            .cloned();

        check_occupancy(
            &snap,
            tenant.id,
            &scope,
            existing_draft.as_ref().map(|l| l.id),
        )?;

        let activate_now = input.monthly_rent.is_some() && input.start_date.is_some();
        let status = if activate_now {
            LeaseStatus::Active
        } else {
            LeaseStatus::Draft
        };
        let rent = input.monthly_rent.unwrap_or(Decimal::ZERO);
        let deposit = input.security_deposit.unwrap_or(Decimal::ZERO);
        let now = chrono::Utc::now();

        let lease = match existing_draft {
            Some(draft) => {
                let mut model: LeaseActiveModel = draft.into();
                model.bedroom_id = Set(scope.bedroom_id());
                model.status = Set(String::from(status));
                model.start_date = Set(input.start_date);
                model.end_date = Set(input.end_date);
                model.monthly_rent = Set(rent);
                model.security_deposit = Set(deposit);
                model.updated_at = Set(now.into());
                model.update(&txn).await?
            }
            None => {
                let model = LeaseActiveModel {
                    id: Set(Uuid::new_v4()),
                    unit_id: Set(input.unit_id),
                    bedroom_id: Set(scope.bedroom_id()),
                    tenant_id: Set(tenant.id),
                    status: Set(String::from(status)),
                    start_date: Set(input.start_date),
                    end_date: Set(input.end_date),
                    monthly_rent: Set(rent),
                    security_deposit: Set(deposit),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                };
                model.insert(&txn).await?
            }
        };

        if activate_now {
            let plan = plan_apply(&snap, &scope);
            write_apply_plan(&txn, &snap, &plan).await?;
            write_tenant_cache(
                &txn,
                tenant.id,
                Some((snap.unit.id, snap.unit.property_id, plan.tenant_bedroom)),
            )
            .await?;

            let start = lease.start_date.ok_or_else(|| AppError::Internal {
                message: "active lease without start date".to_string(),
            })?;
            billing::ensure_first_invoice(&txn, &lease, start, &self.billing).await?;

            if deposit > Decimal::ZERO {
                billing::append_deposit_liability(&txn, tenant.id, lease.id, deposit).await?;
            }
        } else {
            // A reservation seeds "where does this tenant live" only when no
            // Active lease elsewhere already defines it
            let has_active = LeaseEntity::find()
                .filter(LeaseColumn::TenantId.eq(tenant.id))
                .filter(LeaseColumn::Status.eq(String::from(LeaseStatus::Active)))
                .one(&txn)
                .await?
                .is_some();

            if let Some(cache) = draft_cache_update(
                has_active,
                snap.unit.id,
                snap.unit.property_id,
                scope.bedroom_id(),
            ) {
                write_tenant_cache(&txn, tenant.id, Some(cache)).await?;
            }
        }

        txn.commit().await?;
        metrics::record_lease_transition("create", String::from(status).as_str());

        tracing::info!(
            lease_id = %lease.id,
            unit_id = %input.unit_id,
            tenant_id = %tenant.id,
            scope = scope.as_str(),
            status = %lease.status,
            "Lease created"
        );

        Ok(lease)
    }

    /// Activate a DRAFT lease: validate occupancy, set start date to today,
    /// apply status writes and create the first invoice.
    pub async fn activate_lease(&self, lease_id: Uuid) -> Result<Lease> {
        let txn = self.pool.write().begin().await?;

        let (lease, snap) = lock_lease(&txn, lease_id).await?;

        match transition(lease.lease_status(), LeaseOp::Activate)? {
            Transition::To(LeaseStatus::Active) => {}
            _ => {
                return Err(AppError::Internal {
                    message: "activate produced an unexpected transition".to_string(),
                })
            }
        }

        let scope = LeaseScope::from_bedroom(lease.bedroom_id);

        check_occupancy(&snap, lease.tenant_id, &scope, Some(lease.id))?;

        let today = chrono::Utc::now().date_naive();
        let now = chrono::Utc::now();

        let mut model: LeaseActiveModel = lease.clone().into();
        model.status = Set(String::from(LeaseStatus::Active));
        model.start_date = Set(Some(today));
        model.updated_at = Set(now.into());
        let lease = model.update(&txn).await?;

        let plan = plan_apply(&snap, &scope);
        write_apply_plan(&txn, &snap, &plan).await?;
        write_tenant_cache(
            &txn,
            lease.tenant_id,
            Some((snap.unit.id, snap.unit.property_id, plan.tenant_bedroom)),
        )
        .await?;

        billing::ensure_first_invoice(&txn, &lease, today, &self.billing).await?;

        txn.commit().await?;
        metrics::record_lease_transition("activate", "Active");

        tracing::info!(
            lease_id = %lease.id,
            unit_id = %lease.unit_id,
            scope = scope.as_str(),
            "Lease activated"
        );

        Ok(lease)
    }

    /// Correct a lease's monthly rent and back-fill any unpaid zero-amount
    /// invoices tied to it. No status change.
    pub async fn update_lease_rent(&self, lease_id: Uuid, monthly_rent: Decimal) -> Result<Lease> {
        let txn = self.pool.write().begin().await?;

        let lease = require_lease(&txn, lease_id).await?;
        transition(lease.lease_status(), LeaseOp::AdjustRent)?;

        let mut model: LeaseActiveModel = lease.into();
        model.monthly_rent = Set(monthly_rent);
        model.updated_at = Set(chrono::Utc::now().into());
        let lease = model.update(&txn).await?;

        let backfilled =
            billing::backfill_zero_amount_invoices(&txn, lease.id, monthly_rent).await?;

        txn.commit().await?;
        metrics::record_lease_transition("adjust_rent", &lease.status);

        tracing::info!(
            lease_id = %lease.id,
            backfilled_invoices = backfilled,
            "Lease rent updated"
        );

        Ok(lease)
    }

    /// Delete a lease. An Active lease is fully unwound first: its scope is
    /// released back to vacancy and the tenant's occupancy cache cleared.
    pub async fn delete_lease(&self, lease_id: Uuid) -> Result<()> {
        let txn = self.pool.write().begin().await?;

        let (lease, snap) = lock_lease(&txn, lease_id).await?;
        transition(lease.lease_status(), LeaseOp::Delete)?;

        if lease.lease_status() == LeaseStatus::Active {
            let scope = LeaseScope::from_bedroom(lease.bedroom_id);
            let plan = plan_unwind(&snap, &scope);
            write_unwind_plan(&txn, &snap, &plan).await?;
        }

        write_tenant_cache(&txn, lease.tenant_id, None).await?;

        let tenant_id = lease.tenant_id;
        let unit_id = lease.unit_id;
        lease.delete(&txn).await?;

        txn.commit().await?;
        metrics::record_lease_transition("delete", "deleted");

        tracing::info!(
            lease_id = %lease_id,
            unit_id = %unit_id,
            tenant_id = %tenant_id,
            "Lease deleted"
        );

        Ok(())
    }
}

/// Run occupancy validation, counting conflicts for observability
pub(crate) fn check_occupancy(
    snap: &OccupancySnapshot,
    tenant_id: Uuid,
    scope: &LeaseScope,
    exclude_lease: Option<Uuid>,
) -> Result<()> {
    validate_create(snap, tenant_id, scope, exclude_lease).inspect_err(|e| {
        if matches!(e, AppError::OccupancyConflict { .. }) {
            metrics::record_occupancy_conflict(scope.as_str());
        }
    })
}

/// Fetch a lease or fail with a not-found error
pub(crate) async fn require_lease<C: ConnectionTrait>(conn: &C, lease_id: Uuid) -> Result<Lease> {
    LeaseEntity::find_by_id(lease_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::LeaseNotFound {
            id: lease_id.to_string(),
        })
}

/// Take a `FOR UPDATE` lock on a lease row.
///
/// Lock order is always unit row(s) first, lease row second; every caller
/// must hold the relevant unit lock before calling this.
pub(crate) async fn lock_lease_row<C: ConnectionTrait>(conn: &C, lease_id: Uuid) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT id FROM leases WHERE id = $1 FOR UPDATE",
        vec![lease_id.into()],
    );

    conn.query_one(stmt)
        .await?
        .ok_or_else(|| AppError::LeaseNotFound {
            id: lease_id.to_string(),
        })?;

    Ok(())
}

/// Lock a lease's unit and the lease row, then re-read the lease.
///
/// The status that picks a lifecycle branch must be read under lock: a
/// concurrent activation commits `Active` only while holding the unit lock,
/// so a plain read can observe a stale `DRAFT` and skip the unwind. A DRAFT
/// can also be repointed at another unit concurrently, hence the re-check
/// loop on the unit id.
pub(crate) async fn lock_lease<C: ConnectionTrait>(
    conn: &C,
    lease_id: Uuid,
) -> Result<(Lease, OccupancySnapshot)> {
    let mut lease = require_lease(conn, lease_id).await?;

    loop {
        let snap = OccupancySnapshot::load(conn, lease.unit_id).await?;
        lock_lease_row(conn, lease_id).await?;

        let fresh = require_lease(conn, lease_id).await?;
        if fresh.unit_id == snap.unit.id {
            return Ok((fresh, snap));
        }

        lease = fresh;
    }
}

/// Cache update a DRAFT reservation should perform, if any. A reservation
/// only seeds the cache when the tenant holds no Active lease; the Active
/// lease's scope always wins.
pub(crate) fn draft_cache_update(
    has_active_lease: bool,
    unit_id: Uuid,
    property_id: Uuid,
    bedroom_id: Option<Uuid>,
) -> Option<(Uuid, Uuid, Option<Uuid>)> {
    if has_active_lease {
        None
    } else {
        Some((unit_id, property_id, bedroom_id))
    }
}

/// Fetch a directory user and require the TENANT role
pub(crate) async fn require_tenant<C: ConnectionTrait>(conn: &C, tenant_id: Uuid) -> Result<User> {
    let user = UserEntity::find_by_id(tenant_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: tenant_id.to_string(),
        })?;

    if !user.is_tenant() {
        return Err(AppError::Validation {
            message: format!("user {} is not a tenant", tenant_id),
            field: Some("tenant_id".to_string()),
        });
    }

    Ok(user)
}

/// Write an activation plan: unit status/mode plus bedroom statuses
pub(crate) async fn write_apply_plan<C: ConnectionTrait>(
    conn: &C,
    snap: &OccupancySnapshot,
    plan: &ApplyPlan,
) -> Result<()> {
    let now = chrono::Utc::now();

    let mut unit: UnitActiveModel = snap.unit.clone().into();
    unit.status = Set(String::from(plan.unit_status));
    unit.rental_mode = Set(String::from(plan.rental_mode));
    unit.updated_at = Set(now.into());
    unit.update(conn).await?;

    for (bedroom_id, status) in &plan.bedroom_statuses {
        BedroomEntity::update_many()
            .col_expr(BedroomColumn::Status, Expr::value(String::from(*status)))
            .col_expr(BedroomColumn::UpdatedAt, Expr::value(now))
            .filter(BedroomColumn::Id.eq(*bedroom_id))
            .exec(conn)
            .await?;
    }

    Ok(())
}

/// Write an unwind plan: unit status plus bedroom statuses (mode untouched)
pub(crate) async fn write_unwind_plan<C: ConnectionTrait>(
    conn: &C,
    snap: &OccupancySnapshot,
    plan: &UnwindPlan,
) -> Result<()> {
    let now = chrono::Utc::now();

    let mut unit: UnitActiveModel = snap.unit.clone().into();
    unit.status = Set(String::from(plan.unit_status));
    unit.updated_at = Set(now.into());
    unit.update(conn).await?;

    for (bedroom_id, status) in &plan.bedroom_statuses {
        BedroomEntity::update_many()
            .col_expr(BedroomColumn::Status, Expr::value(String::from(*status)))
            .col_expr(BedroomColumn::UpdatedAt, Expr::value(now))
            .filter(BedroomColumn::Id.eq(*bedroom_id))
            .exec(conn)
            .await?;
    }

    Ok(())
}

/// Set or clear a tenant's denormalized occupancy cache
/// (unit / building / bedroom), always in the caller's transaction.
pub(crate) async fn write_tenant_cache<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    cache: Option<(Uuid, Uuid, Option<Uuid>)>,
) -> Result<()> {
    let (unit_id, building_id, bedroom_id) = match cache {
        Some((u, p, b)) => (Some(u), Some(p), b),
        None => (None, None, None),
    };

    UserEntity::update_many()
        .col_expr(UserColumn::UnitId, Expr::value(unit_id))
        .col_expr(UserColumn::BedroomId, Expr::value(bedroom_id))
        .col_expr(UserColumn::BuildingId, Expr::value(building_id))
        .col_expr(UserColumn::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(UserColumn::Id.eq(tenant_id))
        .exec(conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied_snapshot() -> OccupancySnapshot {
        let now = chrono::Utc::now();
        let unit_id = Uuid::new_v4();
        OccupancySnapshot {
            unit: Unit {
                id: unit_id,
                property_id: Uuid::new_v4(),
                unit_number: "U-201".to_string(),
                rental_mode: String::from(RentalMode::BedroomWise),
                status: String::from(UnitStatus::Occupied),
                bedroom_count: 1,
                base_rent: Decimal::new(900, 0),
                created_at: now.into(),
                updated_at: now.into(),
            },
            bedrooms: vec![Bedroom {
                id: Uuid::new_v4(),
                unit_id,
                bedroom_number: "B1".to_string(),
                room_number: 1,
                status: String::from(BedroomStatus::Occupied),
                rent: Decimal::new(450, 0),
                created_at: now.into(),
                updated_at: now.into(),
            }],
            leases: vec![],
        }
    }

    #[test]
    fn test_check_occupancy_surfaces_conflict() {
        let snap = occupied_snapshot();
        let err = check_occupancy(&snap, Uuid::new_v4(), &LeaseScope::FullUnit, None).unwrap_err();
        assert!(matches!(err, AppError::OccupancyConflict { .. }));
        assert!(err.to_string().contains("1 bedroom(s) already occupied"));
    }

    #[test]
    fn test_reservation_does_not_displace_active_cache() {
        let unit_id = Uuid::new_v4();
        let property_id = Uuid::new_v4();

        // Tenant already lives somewhere: the reservation leaves the cache alone
        assert_eq!(draft_cache_update(true, unit_id, property_id, None), None);

        // No Active lease: the reservation seeds the cache with its scope
        let bedroom_id = Uuid::new_v4();
        assert_eq!(
            draft_cache_update(false, unit_id, property_id, Some(bedroom_id)),
            Some((unit_id, property_id, Some(bedroom_id)))
        );
    }

    #[test]
    fn test_check_occupancy_passes_vacant_bedroom_path() {
        let mut snap = occupied_snapshot();
        snap.bedrooms[0].status = String::from(BedroomStatus::Vacant);
        let bedroom_id = snap.bedrooms[0].id;
        assert!(check_occupancy(
            &snap,
            Uuid::new_v4(),
            &LeaseScope::Bedroom(bedroom_id),
            None
        )
        .is_ok());
    }
}
