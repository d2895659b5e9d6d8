use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::db::LocationSample;
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::family_locations::FamilyLocationAggregator;
use crate::services::geodesy::{validate_accuracy, Coordinate};
use crate::services::privacy::LocationEntry;
use crate::services::sharing::{
    ShareDuration, ShareOutcome, SharingService, SharingStatusView, StopOutcome,
};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/share", post(share))
        .route("/update", post(update))
        .route("/stop", post(stop))
        .route("/status", get(status))
        .route("/family", get(family))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub duration: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn share(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
    Json(request): Json<ShareRequest>,
) -> AppResult<Json<ShareOutcome>> {
    let duration: ShareDuration = request.duration.parse()?;

    let position = match (request.latitude, request.longitude) {
        (Some(latitude), Some(longitude)) => Some(Coordinate::new(latitude, longitude)?),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "latitude and longitude must be provided together".to_string(),
            ))
        }
    };
    let accuracy = validate_accuracy(request.accuracy)?;

    let outcome = SharingService::share(&state, &member.id, duration, position, accuracy).await?;
    Ok(Json(outcome))
}

async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
    Json(request): Json<UpdateRequest>,
) -> AppResult<Json<LocationSample>> {
    let position = Coordinate::new(request.latitude, request.longitude)?;
    let accuracy = validate_accuracy(request.accuracy)?;

    let sample = SharingService::update(&state, &member.id, position, accuracy).await?;
    Ok(Json(sample))
}

async fn stop(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
) -> AppResult<Json<StopOutcome>> {
    let outcome = SharingService::stop(&state, &member.id).await?;
    Ok(Json(outcome))
}

async fn status(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
) -> AppResult<Json<SharingStatusView>> {
    let view = SharingService::status(&state, &member.id).await?;
    Ok(Json(view))
}

/// Snapshot of the caller's family.
async fn family(
    State(state): State<Arc<AppState>>,
    AuthUser(member): AuthUser,
) -> AppResult<Json<Vec<LocationEntry>>> {
    let entries = FamilyLocationAggregator::snapshot(&state, &member.family_id).await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use serde_json::json;

    use crate::clock::{Clock, ManualClock};
    use crate::db::Role;
    use crate::services::sweeper::ExpirySweeper;
    use crate::test_support::{self, call};

    #[tokio::test]
    async fn requires_bearer_token() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let app = test_support::app(state);

        let (status, body) = call(&app, Method::GET, "/api/locations/status", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, body) =
            call(&app, Method::GET, "/api/locations/status", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn share_update_family_stop_flow() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let token = test_support::issue_token(&state, &anna.id);
        let app = test_support::app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/share",
            Some(&token),
            Some(json!({ "duration": "1h" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["is_sharing_live"], true);
        assert_eq!(body["status"]["sharing_type"], "temporary");
        assert!(body.get("location").is_none());

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/update",
            Some(&token),
            Some(json!({ "latitude": 48.1351, "longitude": 11.582, "accuracy": 10.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["subject_id"], anna.id.as_str());
        assert_eq!(body["latitude"], 48.1351);

        let (status, body) =
            call(&app, Method::GET, "/api/locations/family", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["user_id"], anna.id.as_str());
        assert_eq!(entries[0]["user_name"], "Anna");
        assert_eq!(entries[0]["subject_type"], "member");
        assert_eq!(entries[0]["longitude"], 11.582);
        assert_eq!(entries[0]["within_geofence"], false);
        assert_eq!(entries[0]["is_sharing_live"], true);

        let (status, body) =
            call(&app, Method::POST, "/api/locations/stop", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["already_stopped"], false);

        let (_, body) = call(&app, Method::POST, "/api/locations/stop", Some(&token), None).await;
        assert_eq!(body["already_stopped"], true);

        let (status, body) =
            call(&app, Method::GET, "/api/locations/status", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_sharing_live"], false);
    }

    async fn share_fifteen_minutes_and_update(app: &axum::Router, token: &str) {
        let (status, _) = call(
            app,
            Method::POST,
            "/api/locations/share",
            Some(token),
            Some(json!({ "duration": "15m" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            app,
            Method::POST,
            "/api/locations/update",
            Some(token),
            Some(json!({ "latitude": 50.11, "longitude": 8.68 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn update_after_expiry_seen_by_family_read_is_expired() {
        let clock = Arc::new(ManualClock::at_noon());
        let state = test_support::test_state_with_clock(clock.clone()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let token = test_support::issue_token(&state, &anna.id);
        let app = test_support::app(state);

        share_fifteen_minutes_and_update(&app, &token).await;

        let (_, body) = call(&app, Method::GET, "/api/locations/family", Some(&token), None).await;
        assert_eq!(body[0]["is_sharing_live"], true);
        assert_eq!(body[0]["latitude"], 50.11);

        clock.advance(Duration::minutes(16));

        // The read clears the stored flag.
        let (status, body) =
            call(&app, Method::GET, "/api/locations/family", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["is_sharing_live"], false);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/update",
            Some(&token),
            Some(json!({ "latitude": 50.12, "longitude": 8.69 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "SHARING_EXPIRED");
    }

    #[tokio::test]
    async fn update_after_sweep_is_expired() {
        let clock = Arc::new(ManualClock::at_noon());
        let state = test_support::test_state_with_clock(clock.clone()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let token = test_support::issue_token(&state, &anna.id);
        let app = test_support::app(state.clone());

        share_fifteen_minutes_and_update(&app, &token).await;

        clock.advance(Duration::minutes(16));
        assert_eq!(ExpirySweeper::sweep(&state.db, clock.now()).await.unwrap(), 1);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/update",
            Some(&token),
            Some(json!({ "latitude": 50.12, "longitude": 8.69 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "SHARING_EXPIRED");

        let (_, body) = call(&app, Method::GET, "/api/locations/status", Some(&token), None).await;
        assert_eq!(body["is_sharing_live"], false);
        assert_eq!(body["sharing_type"], "temporary");
    }

    #[tokio::test]
    async fn rejects_bad_input_before_touching_state() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let token = test_support::issue_token(&state, &anna.id);
        let app = test_support::app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/share",
            Some(&token),
            Some(json!({ "duration": "2w" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "INVALID_DURATION");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/share",
            Some(&token),
            Some(json!({ "duration": "one-time", "latitude": 95.0, "longitude": 8.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "COORDINATE_OUT_OF_RANGE");
        assert_eq!(body["error"]["details"]["field"], "latitude");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/share",
            Some(&token),
            Some(json!({ "duration": "one-time", "latitude": 50.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/update",
            Some(&token),
            Some(json!({ "latitude": 50.0, "longitude": 8.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "SHARING_NOT_ACTIVE");
    }

    #[tokio::test]
    async fn one_time_share_returns_the_sample() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let token = test_support::issue_token(&state, &anna.id);
        let app = test_support::app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/api/locations/share",
            Some(&token),
            Some(json!({ "duration": "one-time", "latitude": 50.0, "longitude": 8.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["is_sharing_live"], false);
        assert_eq!(body["status"]["sharing_type"], "one-time");
        assert_eq!(body["location"]["latitude"], 50.0);
    }
}
