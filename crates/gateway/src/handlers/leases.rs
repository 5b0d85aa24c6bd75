//! Lease lifecycle handlers
//!
//! All writes go through the occupancy engine so every transition keeps
//! unit, bedroom, lease and tenant-cache state consistent in one transaction.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use roost_common::{
    db::models::{Invoice, Lease},
    db::Repository,
    errors::{AppError, Result},
    occupancy::CreateLeaseInput,
};

/// Request to create a lease.
///
/// Supplying both `start_date` and `monthly_rent` activates the lease
/// immediately; otherwise a DRAFT reservation is created.
#[derive(Debug, Deserialize)]
pub struct CreateLeaseRequest {
    pub unit_id: Uuid,
    pub tenant_id: Uuid,

    /// Omit to lease the whole unit
    #[serde(default)]
    pub bedroom_id: Option<Uuid>,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    #[serde(default)]
    pub monthly_rent: Option<Decimal>,

    #[serde(default)]
    pub security_deposit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRentRequest {
    pub monthly_rent: Decimal,
}

#[derive(Serialize)]
pub struct LeaseResponse {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub bedroom_id: Option<Uuid>,
    pub tenant_id: Uuid,
    pub status: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub monthly_rent: Decimal,
    pub security_deposit: Decimal,
    pub created_at: String,
}

impl From<Lease> for LeaseResponse {
    fn from(l: Lease) -> Self {
        Self {
            id: l.id,
            unit_id: l.unit_id,
            bedroom_id: l.bedroom_id,
            tenant_id: l.tenant_id,
            status: l.status,
            start_date: l.start_date,
            end_date: l.end_date,
            monthly_rent: l.monthly_rent,
            security_deposit: l.security_deposit,
            created_at: l.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_no: String,
    pub tenant_id: Uuid,
    pub unit_id: Uuid,
    pub lease_id: Uuid,
    pub month: String,
    pub rent: Decimal,
    pub fees: Decimal,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub balance_due: Decimal,
    pub status: String,
    pub due_date: NaiveDate,
    pub created_at: String,
}

impl From<Invoice> for InvoiceResponse {
    fn from(i: Invoice) -> Self {
        Self {
            id: i.id,
            invoice_no: i.invoice_no,
            tenant_id: i.tenant_id,
            unit_id: i.unit_id,
            lease_id: i.lease_id,
            month: i.month,
            rent: i.rent,
            fees: i.fees,
            amount: i.amount,
            paid_amount: i.paid_amount,
            balance_due: i.balance_due,
            status: i.status,
            due_date: i.due_date,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

/// Create a lease (DRAFT reservation or immediately Active)
pub async fn create_lease(
    State(state): State<AppState>,
    Json(request): Json<CreateLeaseRequest>,
) -> Result<(StatusCode, Json<LeaseResponse>)> {
    // Activation needs both financial terms and a start date
    if request.monthly_rent.is_some() != request.start_date.is_some() {
        return Err(AppError::Validation {
            message: "start_date and monthly_rent must be provided together".to_string(),
            field: None,
        });
    }

    if let Some(rent) = request.monthly_rent {
        if rent <= Decimal::ZERO {
            return Err(AppError::Validation {
                message: "monthly_rent must be positive".to_string(),
                field: Some("monthly_rent".to_string()),
            });
        }
    }

    if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
        if end < start {
            return Err(AppError::Validation {
                message: "end_date cannot precede start_date".to_string(),
                field: Some("end_date".to_string()),
            });
        }
    }

    let lease = state
        .occupancy
        .create_lease(CreateLeaseInput {
            unit_id: request.unit_id,
            tenant_id: request.tenant_id,
            bedroom_id: request.bedroom_id,
            start_date: request.start_date,
            end_date: request.end_date,
            monthly_rent: request.monthly_rent,
            security_deposit: request.security_deposit,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(lease.into())))
}

/// Get a lease by ID
pub async fn get_lease(
    State(state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<Json<LeaseResponse>> {
    let repo = Repository::new(state.db.clone());

    let lease = repo
        .find_lease_by_id(lease_id)
        .await?
        .ok_or_else(|| AppError::LeaseNotFound {
            id: lease_id.to_string(),
        })?;

    Ok(Json(lease.into()))
}

/// Activate a DRAFT lease; the start date is set to today
pub async fn activate_lease(
    State(state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<Json<LeaseResponse>> {
    let lease = state.occupancy.activate_lease(lease_id).await?;
    Ok(Json(lease.into()))
}

/// Correct a lease's monthly rent
pub async fn update_rent(
    State(state): State<AppState>,
    Path(lease_id): Path<Uuid>,
    Json(request): Json<UpdateRentRequest>,
) -> Result<Json<LeaseResponse>> {
    if request.monthly_rent <= Decimal::ZERO {
        return Err(AppError::Validation {
            message: "monthly_rent must be positive".to_string(),
            field: Some("monthly_rent".to_string()),
        });
    }

    let lease = state
        .occupancy
        .update_lease_rent(lease_id, request.monthly_rent)
        .await?;

    Ok(Json(lease.into()))
}

/// Delete a lease, unwinding occupancy when it was Active
pub async fn delete_lease(
    State(state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.occupancy.delete_lease(lease_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List leases of a unit, newest first
pub async fn list_unit_leases(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<Vec<LeaseResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_unit_by_id(unit_id)
        .await?
        .ok_or_else(|| AppError::UnitNotFound {
            id: unit_id.to_string(),
        })?;

    let leases = repo.list_leases_by_unit(unit_id).await?;

    Ok(Json(leases.into_iter().map(Into::into).collect()))
}

/// List invoices tied to a lease, newest first
pub async fn list_lease_invoices(
    State(state): State<AppState>,
    Path(lease_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_lease_by_id(lease_id)
        .await?
        .ok_or_else(|| AppError::LeaseNotFound {
            id: lease_id.to_string(),
        })?;

    let invoices = repo.list_invoices_by_lease(lease_id).await?;

    Ok(Json(invoices.into_iter().map(Into::into).collect()))
}
