//! Occupancy snapshot: locked reads plus pure validation and planning
//!
//! Every lease transition starts by taking a row-level lock on the unit
//! (`SELECT ... FOR UPDATE`) and loading the unit, its bedrooms and its
//! non-terminal leases into an [`OccupancySnapshot`]. Validation and the
//! computation of the resulting status writes are pure functions over that
//! snapshot, so two concurrent activations serialize on the unit lock and the
//! loser revalidates against committed state.

use crate::db::models::*;
use crate::errors::{AppError, Result};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, QueryFilter, QueryOrder, Statement,
};
use uuid::Uuid;

/// The scope a lease covers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseScope {
    /// The whole unit (lease.bedroom_id is null)
    FullUnit,
    /// One bedroom within a BEDROOM_WISE unit
    Bedroom(Uuid),
}

impl LeaseScope {
    pub fn from_bedroom(bedroom_id: Option<Uuid>) -> Self {
        match bedroom_id {
            Some(id) => LeaseScope::Bedroom(id),
            None => LeaseScope::FullUnit,
        }
    }

    pub fn bedroom_id(&self) -> Option<Uuid> {
        match self {
            LeaseScope::FullUnit => None,
            LeaseScope::Bedroom(id) => Some(*id),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseScope::FullUnit => "full_unit",
            LeaseScope::Bedroom(_) => "bedroom",
        }
    }
}

/// Consistent view of one unit's occupancy, read under a row lock
#[derive(Clone, Debug)]
pub struct OccupancySnapshot {
    pub unit: Unit,
    /// Bedrooms ordered by room number
    pub bedrooms: Vec<Bedroom>,
    /// Non-terminal (DRAFT or Active) leases for this unit
    pub leases: Vec<Lease>,
}

impl OccupancySnapshot {
    /// Lock the unit row, then load the unit, bedrooms and live leases.
    ///
    /// The lock must be taken before any validation read so that concurrent
    /// transitions on the same unit serialize instead of racing.
    pub async fn load<C: ConnectionTrait>(conn: &C, unit_id: Uuid) -> Result<Self> {
        lock_unit_row(conn, unit_id).await?;

        let unit = UnitEntity::find_by_id(unit_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::UnitNotFound {
                id: unit_id.to_string(),
            })?;

        let bedrooms = BedroomEntity::find()
            .filter(BedroomColumn::UnitId.eq(unit_id))
            .order_by_asc(BedroomColumn::RoomNumber)
            .all(conn)
            .await?;

        let leases = LeaseEntity::find()
            .filter(LeaseColumn::UnitId.eq(unit_id))
            .filter(
                LeaseColumn::Status.is_in([
                    String::from(LeaseStatus::Draft),
                    String::from(LeaseStatus::Active),
                ]),
            )
            .all(conn)
            .await?;

        Ok(Self {
            unit,
            bedrooms,
            leases,
        })
    }

    /// Bedroom statuses in room-number order
    pub fn bedroom_statuses(&self) -> Vec<BedroomStatus> {
        self.bedrooms.iter().map(|b| b.bedroom_status()).collect()
    }

    pub fn find_bedroom(&self, bedroom_id: Uuid) -> Option<&Bedroom> {
        self.bedrooms.iter().find(|b| b.id == bedroom_id)
    }

    fn live_leases(&self, exclude: Option<Uuid>) -> impl Iterator<Item = &Lease> {
        self.leases
            .iter()
            .filter(move |l| Some(l.id) != exclude)
    }
}

/// Take a `FOR UPDATE` lock on the unit row
async fn lock_unit_row<C: ConnectionTrait>(conn: &C, unit_id: Uuid) -> Result<()> {
    let stmt = Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT id FROM units WHERE id = $1 FOR UPDATE",
        vec![unit_id.into()],
    );

    conn.query_one(stmt)
        .await?
        .ok_or_else(|| AppError::UnitNotFound {
            id: unit_id.to_string(),
        })?;

    Ok(())
}

/// Derive a unit's status from its bedroom statuses (BEDROOM_WISE mode)
///
/// Fully Booked iff every bedroom is occupied, Vacant iff every bedroom is
/// vacant, Occupied otherwise. A unit without bedrooms is Vacant.
pub fn derive_unit_status(statuses: &[BedroomStatus]) -> UnitStatus {
    if statuses.is_empty() {
        return UnitStatus::Vacant;
    }

    let occupied = statuses
        .iter()
        .filter(|s| **s == BedroomStatus::Occupied)
        .count();

    if occupied == statuses.len() {
        UnitStatus::FullyBooked
    } else if occupied == 0 {
        UnitStatus::Vacant
    } else {
        UnitStatus::Occupied
    }
}

/// Validate a create/activate request against the current snapshot.
///
/// `exclude_lease` names a lease whose own row must not count against the
/// request (the DRAFT being activated or reused).
///
/// Rejections carry a human-readable reason naming what conflicted, per the
/// API contract: the caller must learn *why*, not just that it failed.
pub fn validate_create(
    snap: &OccupancySnapshot,
    tenant_id: Uuid,
    scope: &LeaseScope,
    exclude_lease: Option<Uuid>,
) -> Result<()> {
    match scope {
        LeaseScope::FullUnit => {
            let occupied = snap
                .bedrooms
                .iter()
                .filter(|b| b.bedroom_status() == BedroomStatus::Occupied)
                .count();
            if occupied > 0 {
                return Err(AppError::occupancy(format!(
                    "{} bedroom(s) already occupied in unit {}",
                    occupied, snap.unit.unit_number
                )));
            }

            if let Some(active) = snap
                .live_leases(exclude_lease)
                .find(|l| l.lease_status() == LeaseStatus::Active)
            {
                return Err(AppError::occupancy(format!(
                    "unit {} already has an active lease ({})",
                    snap.unit.unit_number, active.id
                )));
            }

            if let Some(draft) = snap.live_leases(exclude_lease).find(|l| {
                l.lease_status() == LeaseStatus::Draft && l.tenant_id != tenant_id
            }) {
                return Err(AppError::occupancy(format!(
                    "unit {} is reserved by a draft lease ({}) for another tenant",
                    snap.unit.unit_number, draft.id
                )));
            }
        }
        LeaseScope::Bedroom(bedroom_id) => {
            if let Some(active) = snap.live_leases(exclude_lease).find(|l| {
                l.lease_status() == LeaseStatus::Active && l.is_full_unit()
            }) {
                return Err(AppError::occupancy(format!(
                    "unit {} is leased as a full unit (lease {})",
                    snap.unit.unit_number, active.id
                )));
            }

            if let Some(draft) = snap.live_leases(exclude_lease).find(|l| {
                l.lease_status() == LeaseStatus::Draft
                    && l.is_full_unit()
                    && l.tenant_id != tenant_id
            }) {
                return Err(AppError::occupancy(format!(
                    "unit {} is reserved whole by a draft lease ({}) for another tenant",
                    snap.unit.unit_number, draft.id
                )));
            }

            let bedroom =
                snap.find_bedroom(*bedroom_id)
                    .ok_or_else(|| AppError::BedroomNotFound {
                        id: bedroom_id.to_string(),
                    })?;

            if bedroom.bedroom_status() != BedroomStatus::Vacant {
                return Err(AppError::occupancy(format!(
                    "bedroom {} in unit {} is not vacant",
                    bedroom.bedroom_number, snap.unit.unit_number
                )));
            }

            if let Some(draft) = snap.live_leases(exclude_lease).find(|l| {
                l.lease_status() == LeaseStatus::Draft
                    && l.bedroom_id == Some(*bedroom_id)
                    && l.tenant_id != tenant_id
            }) {
                return Err(AppError::occupancy(format!(
                    "bedroom {} is reserved by a draft lease ({}) for another tenant",
                    bedroom.bedroom_number, draft.id
                )));
            }
        }
    }

    Ok(())
}

/// The status writes an activation produces
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyPlan {
    pub unit_status: UnitStatus,
    pub rental_mode: RentalMode,
    /// (bedroom id, new status) for every bedroom whose status changes
    pub bedroom_statuses: Vec<(Uuid, BedroomStatus)>,
    /// Bedroom the tenant's occupancy cache should point at
    pub tenant_bedroom: Option<Uuid>,
}

/// Compute the writes that make the snapshot consistent with a new Active
/// lease of the given scope. Validation must have passed already.
pub fn plan_apply(snap: &OccupancySnapshot, scope: &LeaseScope) -> ApplyPlan {
    match scope {
        LeaseScope::FullUnit => ApplyPlan {
            unit_status: UnitStatus::FullyBooked,
            rental_mode: RentalMode::FullUnit,
            // Bedrooms are kept in sync even under full-unit mode so a later
            // mode switch sees consistent state
            bedroom_statuses: snap
                .bedrooms
                .iter()
                .filter(|b| b.bedroom_status() != BedroomStatus::Occupied)
                .map(|b| (b.id, BedroomStatus::Occupied))
                .collect(),
            tenant_bedroom: None,
        },
        LeaseScope::Bedroom(bedroom_id) => {
            let after: Vec<BedroomStatus> = snap
                .bedrooms
                .iter()
                .map(|b| {
                    if b.id == *bedroom_id {
                        BedroomStatus::Occupied
                    } else {
                        b.bedroom_status()
                    }
                })
                .collect();

            ApplyPlan {
                unit_status: derive_unit_status(&after),
                rental_mode: RentalMode::BedroomWise,
                bedroom_statuses: vec![(*bedroom_id, BedroomStatus::Occupied)],
                tenant_bedroom: Some(*bedroom_id),
            }
        }
    }
}

/// Overlay an unwind's status writes onto a snapshot.
///
/// When a move's source and destination share a unit, the destination must
/// be validated against the state the unwind leaves behind, not the state
/// read before it.
pub fn overlay_unwind(snap: &mut OccupancySnapshot, plan: &UnwindPlan) {
    for (bedroom_id, status) in &plan.bedroom_statuses {
        if let Some(b) = snap.bedrooms.iter_mut().find(|b| b.id == *bedroom_id) {
            b.status = String::from(*status);
        }
    }
    snap.unit.status = String::from(plan.unit_status);
}

/// The status writes a delete/move-out unwind produces
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnwindPlan {
    pub unit_status: UnitStatus,
    pub bedroom_statuses: Vec<(Uuid, BedroomStatus)>,
}

/// Compute the writes that release the given scope back to vacancy.
pub fn plan_unwind(snap: &OccupancySnapshot, scope: &LeaseScope) -> UnwindPlan {
    match scope {
        LeaseScope::FullUnit => UnwindPlan {
            unit_status: UnitStatus::Vacant,
            bedroom_statuses: snap
                .bedrooms
                .iter()
                .filter(|b| b.bedroom_status() != BedroomStatus::Vacant)
                .map(|b| (b.id, BedroomStatus::Vacant))
                .collect(),
        },
        LeaseScope::Bedroom(bedroom_id) => {
            let after: Vec<BedroomStatus> = snap
                .bedrooms
                .iter()
                .map(|b| {
                    if b.id == *bedroom_id {
                        BedroomStatus::Vacant
                    } else {
                        b.bedroom_status()
                    }
                })
                .collect();

            UnwindPlan {
                unit_status: derive_unit_status(&after),
                bedroom_statuses: vec![(*bedroom_id, BedroomStatus::Vacant)],
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn unit(id: Uuid, status: UnitStatus, mode: RentalMode) -> Unit {
        let now = chrono::Utc::now();
        Unit {
            id,
            property_id: Uuid::new_v4(),
            unit_number: "U-101".to_string(),
            rental_mode: String::from(mode),
            status: String::from(status),
            bedroom_count: 3,
            base_rent: Decimal::new(1200, 0),
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
            rent: Decimal::new(400, 0),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn lease(
        unit_id: Uuid,
        bedroom_id: Option<Uuid>,
        tenant_id: Uuid,
        status: LeaseStatus,
    ) -> Lease {
        let now = chrono::Utc::now();
        Lease {
            id: Uuid::new_v4(),
            unit_id,
            bedroom_id,
            tenant_id,
            status: String::from(status),
            start_date: None,
            end_date: None,
            monthly_rent: Decimal::new(400, 0),
            security_deposit: Decimal::ZERO,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn snapshot(unit: Unit, bedrooms: Vec<Bedroom>, leases: Vec<Lease>) -> OccupancySnapshot {
        OccupancySnapshot {
            unit,
            bedrooms,
            leases,
        }
    }

    #[test]
    fn test_derive_unit_status() {
        use BedroomStatus::*;
        assert_eq!(derive_unit_status(&[]), UnitStatus::Vacant);
        assert_eq!(derive_unit_status(&[Vacant, Vacant]), UnitStatus::Vacant);
        assert_eq!(derive_unit_status(&[Occupied, Vacant]), UnitStatus::Occupied);
        assert_eq!(
            derive_unit_status(&[Occupied, Occupied]),
            UnitStatus::FullyBooked
        );
    }

    #[test]
    fn test_full_unit_rejected_when_bedroom_occupied() {
        let unit_id = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::Occupied, RentalMode::BedroomWise),
            vec![
                bedroom(Uuid::new_v4(), unit_id, 1, BedroomStatus::Occupied),
                bedroom(Uuid::new_v4(), unit_id, 2, BedroomStatus::Vacant),
            ],
            vec![],
        );

        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::FullUnit, None).unwrap_err();
        assert!(err.to_string().contains("1 bedroom(s) already occupied"));
    }

    #[test]
    fn test_full_unit_exclusivity() {
        let unit_id = Uuid::new_v4();
        let sitting_tenant = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::FullyBooked, RentalMode::FullUnit),
            vec![],
            vec![lease(unit_id, None, sitting_tenant, LeaseStatus::Active)],
        );

        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::FullUnit, None).unwrap_err();
        assert!(err.to_string().contains("already has an active lease"));
    }

    #[test]
    fn test_draft_for_other_tenant_blocks_full_unit() {
        let unit_id = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::Vacant, RentalMode::FullUnit),
            vec![],
            vec![lease(unit_id, None, Uuid::new_v4(), LeaseStatus::Draft)],
        );

        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::FullUnit, None).unwrap_err();
        assert!(err.to_string().contains("reserved by a draft lease"));
    }

    #[test]
    fn test_own_draft_does_not_block() {
        let unit_id = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let draft = lease(unit_id, None, tenant, LeaseStatus::Draft);
        let snap = snapshot(
            unit(unit_id, UnitStatus::Vacant, RentalMode::FullUnit),
            vec![],
            vec![draft],
        );

        assert!(validate_create(&snap, tenant, &LeaseScope::FullUnit, None).is_ok());
    }

    #[test]
    fn test_bedroom_rejected_under_active_full_unit_lease() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::FullyBooked, RentalMode::FullUnit),
            vec![bedroom(b1, unit_id, 1, BedroomStatus::Occupied)],
            vec![lease(unit_id, None, Uuid::new_v4(), LeaseStatus::Active)],
        );

        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::Bedroom(b1), None).unwrap_err();
        assert!(err.to_string().contains("leased as a full unit"));
    }

    #[test]
    fn test_bedroom_must_exist_and_be_vacant() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::Occupied, RentalMode::BedroomWise),
            vec![bedroom(b1, unit_id, 1, BedroomStatus::Occupied)],
            vec![],
        );

        // Unknown bedroom
        let missing = Uuid::new_v4();
        assert!(matches!(
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::Bedroom(missing), None),
            Err(AppError::BedroomNotFound { .. })
        ));

        // Occupied bedroom
        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::Bedroom(b1), None).unwrap_err();
        assert!(err.to_string().contains("is not vacant"));
    }

    #[test]
    fn test_bedroom_exclusivity_against_foreign_draft() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::Vacant, RentalMode::BedroomWise),
            vec![bedroom(b1, unit_id, 1, BedroomStatus::Vacant)],
            vec![lease(unit_id, Some(b1), Uuid::new_v4(), LeaseStatus::Draft)],
        );

        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::Bedroom(b1), None).unwrap_err();
        assert!(err.to_string().contains("reserved by a draft lease"));
    }

    #[test]
    fn test_full_unit_apply_occupies_everything() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::Vacant, RentalMode::BedroomWise),
            vec![
                bedroom(b1, unit_id, 1, BedroomStatus::Vacant),
                bedroom(b2, unit_id, 2, BedroomStatus::Vacant),
            ],
            vec![],
        );

        let plan = plan_apply(&snap, &LeaseScope::FullUnit);
        assert_eq!(plan.unit_status, UnitStatus::FullyBooked);
        assert_eq!(plan.rental_mode, RentalMode::FullUnit);
        assert_eq!(plan.bedroom_statuses.len(), 2);
        assert!(plan
            .bedroom_statuses
            .iter()
            .all(|(_, s)| *s == BedroomStatus::Occupied));
        assert_eq!(plan.tenant_bedroom, None);
    }

    #[test]
    fn test_bedroom_fill_up_scenario() {
        // Unit with 3 vacant bedrooms: activating B1 then B2 keeps the unit
        // Occupied; activating B3 tips it to Fully Booked.
        let unit_id = Uuid::new_v4();
        let ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let mut bedrooms: Vec<Bedroom> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| bedroom(*id, unit_id, i as i32 + 1, BedroomStatus::Vacant))
            .collect();

        let expected = [UnitStatus::Occupied, UnitStatus::Occupied, UnitStatus::FullyBooked];

        for (i, target) in ids.iter().enumerate() {
            let snap = snapshot(
                unit(unit_id, UnitStatus::Vacant, RentalMode::BedroomWise),
                bedrooms.clone(),
                vec![],
            );
            let tenant = Uuid::new_v4();
            validate_create(&snap, tenant, &LeaseScope::Bedroom(*target), None).unwrap();

            let plan = plan_apply(&snap, &LeaseScope::Bedroom(*target));
            assert_eq!(plan.unit_status, expected[i]);
            assert_eq!(plan.rental_mode, RentalMode::BedroomWise);
            assert_eq!(plan.tenant_bedroom, Some(*target));

            // Carry the write forward into the next iteration
            for (id, status) in &plan.bedroom_statuses {
                let b = bedrooms.iter_mut().find(|b| b.id == *id).unwrap();
                b.status = String::from(*status);
            }
        }

        // Property 7: with one bedroom occupied a full-unit attempt names it
        let snap = snapshot(
            unit(unit_id, UnitStatus::FullyBooked, RentalMode::BedroomWise),
            vec![bedrooms[0].clone()],
            vec![],
        );
        let err =
            validate_create(&snap, Uuid::new_v4(), &LeaseScope::FullUnit, None).unwrap_err();
        assert!(err.to_string().contains("1 bedroom(s) already occupied"));
    }

    #[test]
    fn test_full_unit_unwind_restores_vacancy() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::FullyBooked, RentalMode::FullUnit),
            vec![
                bedroom(b1, unit_id, 1, BedroomStatus::Occupied),
                bedroom(b2, unit_id, 2, BedroomStatus::Occupied),
            ],
            vec![],
        );

        let plan = plan_unwind(&snap, &LeaseScope::FullUnit);
        assert_eq!(plan.unit_status, UnitStatus::Vacant);
        assert_eq!(plan.bedroom_statuses.len(), 2);
        assert!(plan
            .bedroom_statuses
            .iter()
            .all(|(_, s)| *s == BedroomStatus::Vacant));
    }

    #[test]
    fn test_bedroom_unwind_keeps_other_occupants() {
        let unit_id = Uuid::new_v4();
        let b1 = Uuid::new_v4();
        let b2 = Uuid::new_v4();
        let snap = snapshot(
            unit(unit_id, UnitStatus::FullyBooked, RentalMode::BedroomWise),
            vec![
                bedroom(b1, unit_id, 1, BedroomStatus::Occupied),
                bedroom(b2, unit_id, 2, BedroomStatus::Occupied),
            ],
            vec![],
        );

        let plan = plan_unwind(&snap, &LeaseScope::Bedroom(b1));
        assert_eq!(plan.unit_status, UnitStatus::Occupied);
        assert_eq!(plan.bedroom_statuses, vec![(b1, BedroomStatus::Vacant)]);

        // Releasing the last occupied bedroom empties the unit
        let snap = snapshot(
            unit(unit_id, UnitStatus::Occupied, RentalMode::BedroomWise),
            vec![
                bedroom(b1, unit_id, 1, BedroomStatus::Vacant),
                bedroom(b2, unit_id, 2, BedroomStatus::Occupied),
            ],
            vec![],
        );
        let plan = plan_unwind(&snap, &LeaseScope::Bedroom(b2));
        assert_eq!(plan.unit_status, UnitStatus::Vacant);
    }

    #[test]
    fn test_activation_excludes_its_own_draft() {
        let unit_id = Uuid::new_v4();
        let tenant = Uuid::new_v4();
        let draft = lease(unit_id, None, tenant, LeaseStatus::Draft);
        let draft_id = draft.id;
        let snap = snapshot(
            unit(unit_id, UnitStatus::Vacant, RentalMode::FullUnit),
            vec![],
            vec![draft],
        );

        assert!(validate_create(&snap, tenant, &LeaseScope::FullUnit, Some(draft_id)).is_ok());
    }
}
