use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;

use crate::db::Geofence;
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::geodesy::Coordinate;
use crate::services::geofence::GeofenceService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_geofences).post(create_geofence))
        .route("/:id", delete(delete_geofence))
}

#[derive(Debug, Deserialize)]
pub struct CreateGeofenceRequest {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    // A client-supplied `radius` is ignored; every fence gets the fixed one.
}

async fn list_geofences(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
) -> AppResult<Json<Vec<Geofence>>> {
    let fences = GeofenceService::list(&state, &member).await?;
    Ok(Json(fences))
}

async fn create_geofence(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
    Json(request): Json<CreateGeofenceRequest>,
) -> AppResult<(StatusCode, Json<Geofence>)> {
    let centre = Coordinate::new(request.latitude, request.longitude)?;
    let fence = GeofenceService::create(&state, &member, &request.name, centre).await?;
    Ok((StatusCode::CREATED, Json(fence)))
}

async fn delete_geofence(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    GeofenceService::delete(&state, &member, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
