//! Tenant reassignment between units or bedrooms
//!
//! Moving a tenant with an Active lease closes that lease as MOVED and opens
//! a new Active lease at the destination, unwinding and applying occupancy on
//! both sides in one transaction. A tenant holding only a DRAFT reservation
//! has the reservation repointed in place instead.

use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::occupancy::billing;
use crate::occupancy::snapshot::{
    overlay_unwind, plan_apply, plan_unwind, LeaseScope, OccupancySnapshot,
};
use crate::occupancy::state_machine::{transition, LeaseOp};
use crate::occupancy::synchronizer::{
    check_occupancy, lock_lease_row, require_lease, require_tenant, write_apply_plan,
    write_tenant_cache, write_unwind_plan, OccupancyService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

impl OccupancyService {
    /// Move a tenant to a new unit (and optionally a specific bedroom).
    ///
    /// Returns the lease now covering the tenant's occupancy: a fresh Active
    /// lease when the tenant was Active, or the repointed DRAFT otherwise.
    pub async fn move_tenant(
        &self,
        tenant_id: Uuid,
        new_unit_id: Uuid,
        new_bedroom_id: Option<Uuid>,
    ) -> Result<Lease> {
        let txn = self.pool().write().begin().await?;

        let tenant = require_tenant(&txn, tenant_id).await?;
        let current = find_current_lease(&txn, tenant.id).await?;
        let new_scope = LeaseScope::from_bedroom(new_bedroom_id);

        let lease = match current.lease_status() {
            LeaseStatus::Active => {
                relocate_active(&txn, self.billing(), current, new_unit_id, new_scope).await?
            }
            LeaseStatus::Draft => repoint_draft(&txn, current, new_unit_id, new_scope).await?,
            LeaseStatus::Moved => {
                return Err(AppError::IllegalTransition {
                    from: String::from(LeaseStatus::Moved),
                    op: LeaseOp::MoveOut.as_str().to_string(),
                })
            }
        };

        txn.commit().await?;
        metrics::record_tenant_move();

        tracing::info!(
            tenant_id = %tenant_id,
            lease_id = %lease.id,
            unit_id = %new_unit_id,
            scope = new_scope.as_str(),
            status = %lease.status,
            "Tenant moved"
        );

        Ok(lease)
    }
}

/// The lease that currently defines the tenant's occupancy: the Active lease
/// if one exists, otherwise the most recent DRAFT.
async fn find_current_lease<C: ConnectionTrait>(conn: &C, tenant_id: Uuid) -> Result<Lease> {
    if let Some(active) = LeaseEntity::find()
        .filter(LeaseColumn::TenantId.eq(tenant_id))
        .filter(LeaseColumn::Status.eq(String::from(LeaseStatus::Active)))
        .one(conn)
        .await?
    {
        return Ok(active);
    }

    LeaseEntity::find()
        .filter(LeaseColumn::TenantId.eq(tenant_id))
        .filter(LeaseColumn::Status.eq(String::from(LeaseStatus::Draft)))
        .order_by_desc(LeaseColumn::CreatedAt)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "lease".to_string(),
            id: tenant_id.to_string(),
        })
}

/// Close the Active lease as MOVED, unwind its scope, and open a new Active
/// lease at the destination carrying the same financial terms.
async fn relocate_active<C: ConnectionTrait>(
    conn: &C,
    billing_cfg: &crate::config::BillingConfig,
    candidate: Lease,
    new_unit_id: Uuid,
    new_scope: LeaseScope,
) -> Result<Lease> {
    // Lock units in id order so two concurrent moves between the same pair
    // of units cannot deadlock, then lock the lease row and re-read it: the
    // status and unit that drive the move must be decided under lock, and a
    // concurrent move can have repointed the lease at another unit.
    let (old, old_snap, mut new_snap) = {
        let mut current = candidate;
        loop {
            let (a, b) = if current.unit_id == new_unit_id {
                let snap = OccupancySnapshot::load(conn, current.unit_id).await?;
                (snap.clone(), snap)
            } else if current.unit_id < new_unit_id {
                let a = OccupancySnapshot::load(conn, current.unit_id).await?;
                let b = OccupancySnapshot::load(conn, new_unit_id).await?;
                (a, b)
            } else {
                let b = OccupancySnapshot::load(conn, new_unit_id).await?;
                let a = OccupancySnapshot::load(conn, current.unit_id).await?;
                (a, b)
            };

            lock_lease_row(conn, current.id).await?;
            let fresh = require_lease(conn, current.id).await?;
            if fresh.unit_id == a.unit.id {
                break (fresh, a, b);
            }

            current = fresh;
        }
    };

    transition(old.lease_status(), LeaseOp::MoveOut)?;

    let same_unit = old.unit_id == new_unit_id;
    let old_scope = LeaseScope::from_bedroom(old.bedroom_id);
    let unwind = plan_unwind(&old_snap, &old_scope);

    // Within one unit the destination is validated against post-unwind
    // bedroom state, otherwise vacating bedroom A could not free it for the
    // same move's destination check.
    if same_unit {
        overlay_unwind(&mut new_snap, &unwind);
    }

    check_occupancy(&new_snap, old.tenant_id, &new_scope, Some(old.id))?;

    write_unwind_plan(conn, &old_snap, &unwind).await?;

    let today = chrono::Utc::now().date_naive();
    let now = chrono::Utc::now();
    let tenant_id = old.tenant_id;
    let monthly_rent = old.monthly_rent;
    let security_deposit = old.security_deposit;

    let mut closed: LeaseActiveModel = old.into();
    closed.status = Set(String::from(LeaseStatus::Moved));
    closed.end_date = Set(Some(today));
    closed.updated_at = Set(now.into());
    closed.update(conn).await?;

    let replacement = LeaseActiveModel {
        id: Set(Uuid::new_v4()),
        unit_id: Set(new_unit_id),
        bedroom_id: Set(new_scope.bedroom_id()),
        tenant_id: Set(tenant_id),
        status: Set(String::from(LeaseStatus::Active)),
        start_date: Set(Some(today)),
        end_date: Set(None),
        monthly_rent: Set(monthly_rent),
        // The deposit moves with the tenant; no second liability is booked
        security_deposit: Set(security_deposit),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };
    let replacement = replacement.insert(conn).await?;

    let plan = plan_apply(&new_snap, &new_scope);
    write_apply_plan(conn, &new_snap, &plan).await?;
    write_tenant_cache(
        conn,
        tenant_id,
        Some((new_unit_id, new_snap.unit.property_id, plan.tenant_bedroom)),
    )
    .await?;

    billing::ensure_first_invoice(conn, &replacement, today, billing_cfg).await?;

    Ok(replacement)
}

/// Repoint a DRAFT reservation at a different unit/bedroom in place.
async fn repoint_draft<C: ConnectionTrait>(
    conn: &C,
    candidate: Lease,
    new_unit_id: Uuid,
    new_scope: LeaseScope,
) -> Result<Lease> {
    let snap = OccupancySnapshot::load(conn, new_unit_id).await?;

    // Re-read under the lease row lock; a concurrent activation turns the
    // reservation Active, which must reject the in-place repoint
    lock_lease_row(conn, candidate.id).await?;
    let draft = require_lease(conn, candidate.id).await?;
    transition(draft.lease_status(), LeaseOp::Repoint)?;

    check_occupancy(&snap, draft.tenant_id, &new_scope, Some(draft.id))?;

    let tenant_id = draft.tenant_id;

    let mut model: LeaseActiveModel = draft.into();
    model.unit_id = Set(new_unit_id);
    model.bedroom_id = Set(new_scope.bedroom_id());
    model.updated_at = Set(chrono::Utc::now().into());
    let lease = model.update(conn).await?;

    write_tenant_cache(
        conn,
        tenant_id,
        Some((new_unit_id, snap.unit.property_id, new_scope.bedroom_id())),
    )
    .await?;

    Ok(lease)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::snapshot::validate_create;
    use rust_decimal::Decimal;

    fn unit(id: Uuid, status: UnitStatus, mode: RentalMode) -> Unit {
        let now = chrono::Utc::now();
        Unit {
            id,
            property_id: Uuid::new_v4(),
            unit_number: "U-301".to_string(),
            rental_mode: String::from(mode),
            status: String::from(status),
            bedroom_count: 2,
            base_rent: Decimal::new(1000, 0),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn bedroom(id: Uuid, unit_id: Uuid, room: i32, status: BedroomStatus) -> Bedroom {
        let now = chrono::Utc::now();
        Bedroom {
            id,
            unit_id,
            bedroom_number: format!("B{}", room),
            room_number: room,
            status: String::from(status),
            rent: Decimal::new(500, 0),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn active_lease(unit_id: Uuid, bedroom_id: Option<Uuid>, tenant_id: Uuid) -> Lease {
        let now = chrono::Utc::now();
        Lease {
            id: Uuid::new_v4(),
            unit_id,
            bedroom_id,
            tenant_id,
            status: String::from(LeaseStatus::Active),
            start_date: Some(now.date_naive()),
            end_date: None,
            monthly_rent: Decimal::new(1000, 0),
            security_deposit: Decimal::ZERO,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_move_between_units_releases_source_and_books_destination() {
        // Tenant holds a full-unit lease on unit A; moving to unit B must
        // leave A fully vacant and book B whole.
        let tenant = Uuid::new_v4();
        let unit_a = Uuid::new_v4();
        let unit_b = Uuid::new_v4();
        let a1 = Uuid::new_v4();
        let a2 = Uuid::new_v4();

        let old_lease = active_lease(unit_a, None, tenant);
        let old_snap = OccupancySnapshot {
            unit: unit(unit_a, UnitStatus::FullyBooked, RentalMode::FullUnit),
            bedrooms: vec![
                bedroom(a1, unit_a, 1, BedroomStatus::Occupied),
                bedroom(a2, unit_a, 2, BedroomStatus::Occupied),
            ],
            leases: vec![old_lease.clone()],
        };
        let new_snap = OccupancySnapshot {
            unit: unit(unit_b, UnitStatus::Vacant, RentalMode::FullUnit),
            bedrooms: vec![],
            leases: vec![],
        };

        // The closing transition is legal only from Active
        assert!(transition(old_lease.lease_status(), LeaseOp::MoveOut).is_ok());

        let unwind = plan_unwind(&old_snap, &LeaseScope::FullUnit);
        assert_eq!(unwind.unit_status, UnitStatus::Vacant);
        assert!(unwind
            .bedroom_statuses
            .iter()
            .all(|(_, s)| *s == BedroomStatus::Vacant));

        validate_create(&new_snap, tenant, &LeaseScope::FullUnit, Some(old_lease.id)).unwrap();
        let apply = plan_apply(&new_snap, &LeaseScope::FullUnit);
        assert_eq!(apply.unit_status, UnitStatus::FullyBooked);
        assert_eq!(apply.rental_mode, RentalMode::FullUnit);
        assert_eq!(apply.tenant_bedroom, None);
    }

    #[test]
    fn test_same_unit_move_validates_against_released_state() {
        // Full-unit lease downsizing to one bedroom of the same unit: the
        // destination bedroom only becomes free once the old scope unwinds.
        let tenant = Uuid::new_v4();
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();

        let old_lease = active_lease(unit_id, None, tenant);
        let mut snap = OccupancySnapshot {
            unit: unit(unit_id, UnitStatus::FullyBooked, RentalMode::FullUnit),
            bedrooms: vec![
                bedroom(b1, unit_id, 1, BedroomStatus::Occupied),
                bedroom(b2, unit_id, 2, BedroomStatus::Occupied),
            ],
            leases: vec![old_lease.clone()],
        };

        // Against the pre-unwind state the bedroom is still taken
        let err = validate_create(&snap, tenant, &LeaseScope::Bedroom(b1), Some(old_lease.id))
            .unwrap_err();
        assert!(err.to_string().contains("is not vacant"));

        let unwind = plan_unwind(&snap, &LeaseScope::FullUnit);
        overlay_unwind(&mut snap, &unwind);

        validate_create(&snap, tenant, &LeaseScope::Bedroom(b1), Some(old_lease.id)).unwrap();
        let apply = plan_apply(&snap, &LeaseScope::Bedroom(b1));
        assert_eq!(apply.unit_status, UnitStatus::Occupied);
        assert_eq!(apply.rental_mode, RentalMode::BedroomWise);
        assert_eq!(apply.tenant_bedroom, Some(b1));
    }
}
