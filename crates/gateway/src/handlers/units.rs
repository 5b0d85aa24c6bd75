//! Unit and bedroom inventory handlers
//!
//! Unit and bedroom `status` / `rental_mode` fields are read-only here; they
//! are written only by the occupancy engine as leases change.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use roost_common::{
    db::models::{Bedroom, Unit},
    db::Repository,
    errors::{AppError, Result},
};

/// Request to create a unit under a property
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitRequest {
    #[validate(length(min = 1, max = 50))]
    pub unit_number: String,

    #[validate(range(min = 0, max = 50))]
    pub bedroom_count: i32,

    pub base_rent: Decimal,
}

/// Request to create a bedroom within a unit
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBedroomRequest {
    #[validate(length(min = 1, max = 50))]
    pub bedroom_number: String,

    #[validate(range(min = 1, max = 50))]
    pub room_number: i32,

    pub rent: Decimal,
}

#[derive(Serialize)]
pub struct UnitResponse {
    pub id: Uuid,
    pub property_id: Uuid,
    pub unit_number: String,
    pub rental_mode: String,
    pub status: String,
    pub bedroom_count: i32,
    pub base_rent: Decimal,
    pub created_at: String,
}

impl From<Unit> for UnitResponse {
    fn from(u: Unit) -> Self {
        Self {
            id: u.id,
            property_id: u.property_id,
            unit_number: u.unit_number,
            rental_mode: u.rental_mode,
            status: u.status,
            bedroom_count: u.bedroom_count,
            base_rent: u.base_rent,
            created_at: u.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize)]
pub struct BedroomResponse {
    pub id: Uuid,
    pub unit_id: Uuid,
    pub bedroom_number: String,
    pub room_number: i32,
    pub status: String,
    pub rent: Decimal,
    pub created_at: String,
}

impl From<Bedroom> for BedroomResponse {
    fn from(b: Bedroom) -> Self {
        Self {
            id: b.id,
            unit_id: b.unit_id,
            bedroom_number: b.bedroom_number,
            room_number: b.room_number,
            status: b.status,
            rent: b.rent,
            created_at: b.created_at.to_rfc3339(),
        }
    }
}

/// Unit with its bedrooms
#[derive(Serialize)]
pub struct UnitDetailResponse {
    #[serde(flatten)]
    pub unit: UnitResponse,
    pub bedrooms: Vec<BedroomResponse>,
}

/// Create a unit under a property. New units start Vacant in full-unit mode.
pub async fn create_unit(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
    Json(request): Json<CreateUnitRequest>,
) -> Result<(StatusCode, Json<UnitResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let unit = repo
        .create_unit(
            property_id,
            request.unit_number,
            request.bedroom_count,
            request.base_rent,
        )
        .await?;

    tracing::info!(
        unit_id = %unit.id,
        property_id = %property_id,
        unit_number = %unit.unit_number,
        "Unit created"
    );

    Ok((StatusCode::CREATED, Json(unit.into())))
}

/// Get a unit with its bedrooms
pub async fn get_unit(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<UnitDetailResponse>> {
    let repo = Repository::new(state.db.clone());

    let unit = repo
        .find_unit_by_id(unit_id)
        .await?
        .ok_or_else(|| AppError::UnitNotFound {
            id: unit_id.to_string(),
        })?;

    let bedrooms = repo.list_bedrooms(unit_id).await?;

    Ok(Json(UnitDetailResponse {
        unit: unit.into(),
        bedrooms: bedrooms.into_iter().map(Into::into).collect(),
    }))
}

/// List units of a property
pub async fn list_units(
    State(state): State<AppState>,
    Path(property_id): Path<Uuid>,
) -> Result<Json<Vec<UnitResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_property_by_id(property_id)
        .await?
        .ok_or_else(|| AppError::PropertyNotFound {
            id: property_id.to_string(),
        })?;

    let units = repo.list_units(property_id).await?;

    Ok(Json(units.into_iter().map(Into::into).collect()))
}

/// Create a bedroom within a unit. New bedrooms start Vacant.
pub async fn create_bedroom(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
    Json(request): Json<CreateBedroomRequest>,
) -> Result<(StatusCode, Json<BedroomResponse>)> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let repo = Repository::new(state.db.clone());
    let bedroom = repo
        .create_bedroom(
            unit_id,
            request.bedroom_number,
            request.room_number,
            request.rent,
        )
        .await?;

    tracing::info!(
        bedroom_id = %bedroom.id,
        unit_id = %unit_id,
        bedroom_number = %bedroom.bedroom_number,
        "Bedroom created"
    );

    Ok((StatusCode::CREATED, Json(bedroom.into())))
}

/// List bedrooms of a unit, in room-number order
pub async fn list_bedrooms(
    State(state): State<AppState>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<Vec<BedroomResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_unit_by_id(unit_id)
        .await?
        .ok_or_else(|| AppError::UnitNotFound {
            id: unit_id.to_string(),
        })?;

    let bedrooms = repo.list_bedrooms(unit_id).await?;

    Ok(Json(bedrooms.into_iter().map(Into::into).collect()))
}
