//! Occupancy engine
//!
//! The lease lifecycle core: an explicit lease state machine, the occupancy
//! synchronizer that keeps Unit/Bedroom/Lease/tenant-cache state mutually
//! consistent inside one transaction per operation, tenant reassignment
//! between units, and the first-invoice billing artifact.
//!
//! This module is the single writer of unit/bedroom `status` and
//! `rental_mode` columns; every other code path treats them as read-only.

pub mod billing;
pub mod reassignment;
pub mod snapshot;
pub mod state_machine;
mod synchronizer;

pub use snapshot::{
    derive_unit_status, overlay_unwind, plan_apply, plan_unwind, validate_create, ApplyPlan,
    LeaseScope, OccupancySnapshot, UnwindPlan,
};
pub use state_machine::{transition, LeaseOp, Transition};
pub use synchronizer::{CreateLeaseInput, OccupancyService};
