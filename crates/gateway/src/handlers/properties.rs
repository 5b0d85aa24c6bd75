//! Property management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use roost_common::{
    db::models::Property,
    db::Repository,
    errors::{AppError, Result},
};

/// Request to create a property
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePropertyRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,

    #[validate(length(min = 1, max = 500))]
    pub address_line: String,

    #[validate(length(min = 1, max = 100))]
    pub city: String,

    pub postal_code: Option<String>,
}

#[derive(Serialize)]
pub struct PropertyResponse {
    pub id: Uuid,
    pub name: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub created_at: String,
}

impl From<Property> for PropertyResponse {
    fn from(p: Property) -> Self {
        Self {
            id: p.id,
            name: p.name,
            address_line: p.address_line,
            city: p.city,
            postal_code: p.postal_code,
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Create a new property
pub async fn create_property(
    State(state): State<AppState>,
    Json(request): Json<CreatePropertyRequest>,
) -> Result<(StatusCode, Json<PropertyResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let property = repo
        .create_property(
            request.name,
            request.address_line,
            request.city,
            request.postal_code,
        )
        .await?;

    tracing::info!(property_id = %property.id, name = %property.name, "Property created");

    Ok((StatusCode::CREATED, Json(property.into())))
}

/// Get a property by ID
pub async fn get_property(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<PropertyResponse>> {
    let repo = Repository::new(state.db.clone());

    let property = repo
        .find_property_by_id(property_id)
        .await?
        .ok_or_else(|| AppError::PropertyNotFound {
            id: property_id.to_string(),
        })?;

    Ok(Json(property.into()))
}

/// List all properties
pub async fn list_properties(
    State(state): State<AppState>,
) -> Result<Json<Vec<PropertyResponse>>> {
    let repo = Repository::new(state.db.clone());
    let properties = repo.list_properties().await?;

    Ok(Json(properties.into_iter().map(Into::into).collect()))
}

/// Delete a property and everything under it (units, bedrooms, leases,
/// invoices, tenant occupancy caches), in one transaction
pub async fn delete_property(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    repo.delete_property_cascade(property_id).await?;

    tracing::info!(property_id = %property_id, "Property deleted");

    Ok(StatusCode::NO_CONTENT)
}
