use std::sync::Arc;

use crate::db::{Geofence, GeofenceRepository, Member, NewGeofence};
use crate::error::{AppError, AppResult};
use crate::services::geodesy::Coordinate;
use crate::AppState;

/// Every geofence is a circle of this radius, whatever the client sends.
pub const GEOFENCE_RADIUS_METERS: f64 = 50.0;

const MAX_GEOFENCE_NAME_LEN: usize = 100;

/// Return the first fence (in the given order) whose circle contains `point`.
///
/// First match wins, not nearest: with overlapping fences the caller's
/// ordering decides. Fences with an unusable centre are skipped.
pub fn match_geofence<'a>(point: Option<Coordinate>, fences: &'a [Geofence]) -> Option<&'a Geofence> {
    let point = point?;

    fences.iter().find(|fence| {
        match Coordinate::new(fence.latitude, fence.longitude) {
            Ok(centre) => point.distance_to(&centre) <= fence.radius,
            Err(_) => {
                tracing::debug!("Skipping geofence {} with malformed centre", fence.id);
                false
            }
        }
    })
}

pub struct GeofenceService;

impl GeofenceService {
    pub async fn list(state: &Arc<AppState>, member: &Member) -> AppResult<Vec<Geofence>> {
        GeofenceRepository::list_by_family(&state.db, &member.family_id).await
    }

    /// Create a fence in the member's family. Only parents may do this; the
    /// radius is always `GEOFENCE_RADIUS_METERS`.
    pub async fn create(
        state: &Arc<AppState>,
        member: &Member,
        name: &str,
        centre: Coordinate,
    ) -> AppResult<Geofence> {
        if !member.role.can_manage_geofences() {
            return Err(AppError::UnauthorizedGeofenceMutation);
        }

        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Geofence name cannot be empty".to_string()));
        }
        if name.chars().count() > MAX_GEOFENCE_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Geofence name cannot exceed {} characters",
                MAX_GEOFENCE_NAME_LEN
            )));
        }

        let fence = NewGeofence {
            family_id: member.family_id.clone(),
            name: name.to_string(),
            latitude: centre.latitude,
            longitude: centre.longitude,
            created_by: member.id.clone(),
        };

        let created =
            GeofenceRepository::create(&state.db, &fence, GEOFENCE_RADIUS_METERS, state.clock.now())
                .await?;
        tracing::info!(
            "Geofence {} ('{}') created in family {}",
            created.id,
            created.name,
            created.family_id
        );
        Ok(created)
    }

    pub async fn delete(state: &Arc<AppState>, member: &Member, geofence_id: &str) -> AppResult<()> {
        if !member.role.can_manage_geofences() {
            return Err(AppError::UnauthorizedGeofenceMutation);
        }

        if !GeofenceRepository::delete(&state.db, &member.family_id, geofence_id).await? {
            return Err(AppError::NotFound(format!("Geofence {}", geofence_id)));
        }

        tracing::info!(
            "Geofence {} deleted from family {}",
            geofence_id,
            member.family_id
        );
        Ok(())
    }
}
