//! Tenant directory and reassignment handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::handlers::leases::{InvoiceResponse, LeaseResponse};
use crate::AppState;
use roost_common::{
    db::models::{User, UserRole},
    db::Repository,
    errors::{AppError, Result},
};

/// Request to create a tenant
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTenantRequest {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,

    #[validate(email)]
    pub email: String,

    pub phone: Option<String>,
}

/// Request to move a tenant to a new unit/bedroom
#[derive(Debug, Deserialize)]
pub struct MoveTenantRequest {
    pub unit_id: Uuid,

    /// Omit when the destination is a whole unit
    #[serde(default)]
    pub bedroom_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct TenantResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    /// Occupancy cache mirroring the current lease
    pub unit_id: Option<Uuid>,
    pub bedroom_id: Option<Uuid>,
    pub building_id: Option<Uuid>,
    pub created_at: String,
}

impl From<User> for TenantResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name,
            email: u.email,
            phone: u.phone,
            role: u.role,
            unit_id: u.unit_id,
            bedroom_id: u.bedroom_id,
            building_id: u.building_id,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

/// Create a tenant
pub async fn create_tenant(
    State(state): State<AppState>,
    Json(request): Json<CreateTenantRequest>,
) -> Result<(StatusCode, Json<TenantResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let tenant = repo
        .create_user(
            request.full_name,
            request.email,
            request.phone,
            UserRole::Tenant,
        )
        .await?;

    tracing::info!(tenant_id = %tenant.id, "Tenant created");

    Ok((StatusCode::CREATED, Json(tenant.into())))
}

/// Get a tenant by ID
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<TenantResponse>> {
    let repo = Repository::new(state.db.clone());

    let tenant = repo
        .find_user_by_id(tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: tenant_id.to_string(),
        })?;

    Ok(Json(tenant.into()))
}

/// Move a tenant to a new unit (and optionally a specific bedroom).
///
/// An Active lease is closed as MOVED and replaced by a fresh Active lease
/// at the destination; a DRAFT reservation is repointed in place.
pub async fn move_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(request): Json<MoveTenantRequest>,
) -> Result<Json<LeaseResponse>> {
    let lease = state
        .occupancy
        .move_tenant(tenant_id, request.unit_id, request.bedroom_id)
        .await?;

    Ok(Json(lease.into()))
}

/// List a tenant's leases, newest first
pub async fn list_tenant_leases(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<LeaseResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_user_by_id(tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: tenant_id.to_string(),
        })?;

    let leases = repo.list_leases_by_tenant(tenant_id).await?;

    Ok(Json(leases.into_iter().map(Into::into).collect()))
}

/// List a tenant's invoices, newest first
pub async fn list_tenant_invoices(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Result<Json<Vec<InvoiceResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_user_by_id(tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: tenant_id.to_string(),
        })?;

    let invoices = repo.list_invoices_by_tenant(tenant_id).await?;

    Ok(Json(invoices.into_iter().map(Into::into).collect()))
}
