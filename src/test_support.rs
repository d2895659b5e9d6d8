//! Fixtures shared by the unit tests: an in-memory database with the real
//! migrations applied, and helpers to seed the account tables this service
//! only reads in production.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use http_body_util::BodyExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::clock::{Clock, ManualClock};
use crate::config::Config;
use crate::routes;
use crate::db::{ChildProfile, Member, Role};
use crate::services::auth::Claims;
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "test-secret";

pub fn noon() -> NaiveDateTime {
    ManualClock::at_noon().now()
}

/// Single-connection pool so every query sees the same in-memory database.
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("in-memory url")
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .expect("open in-memory database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub async fn test_state(clock: ManualClock) -> Arc<AppState> {
    test_state_with_clock(Arc::new(clock)).await
}

/// Keep a handle on the clock to move time during the test.
pub async fn test_state_with_clock(clock: Arc<ManualClock>) -> Arc<AppState> {
    let mut config = Config::default();
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config.sharing.sweeper_enabled = false;

    Arc::new(AppState {
        db: test_pool().await,
        config,
        clock,
    })
}

pub async fn insert_family(pool: &SqlitePool, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO families (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(name)
        .bind(noon())
        .bind(noon())
        .execute(pool)
        .await
        .expect("insert family");
    id
}

pub async fn insert_member(pool: &SqlitePool, family_id: &str, first_name: &str, role: Role) -> Member {
    let id = Uuid::new_v4().to_string();
    sqlx::query_as::<_, Member>(
        r#"
        INSERT INTO members (
            id, family_id, username, first_name, last_name, role,
            avatar, color, created_at, updated_at
        ) VALUES (?, ?, ?, ?, '', ?, ?, ?, ?, ?)
        RETURNING
            id, family_id, username, first_name, last_name, role,
            avatar, color, created_at, updated_at
        "#,
    )
    .bind(&id)
    .bind(family_id)
    .bind(format!("{}-{}", first_name.to_lowercase(), &id[..8]))
    .bind(first_name)
    .bind(role)
    .bind(format!("/avatars/{}.png", first_name.to_lowercase()))
    .bind("#3366ff")
    .bind(noon())
    .bind(noon())
    .fetch_one(pool)
    .await
    .expect("insert member")
}

pub async fn insert_child_profile(
    pool: &SqlitePool,
    family_id: &str,
    first_name: &str,
    manager_id: &str,
    linked_user_id: Option<&str>,
) -> ChildProfile {
    let id = Uuid::new_v4().to_string();
    sqlx::query_as::<_, ChildProfile>(
        r#"
        INSERT INTO child_profiles (
            id, family_id, first_name, last_name, linked_user_id, manager_id,
            avatar, color, created_at, updated_at
        ) VALUES (?, ?, ?, '', ?, ?, NULL, ?, ?, ?)
        RETURNING
            id, family_id, first_name, last_name, linked_user_id, manager_id,
            avatar, color, created_at, updated_at
        "#,
    )
    .bind(&id)
    .bind(family_id)
    .bind(first_name)
    .bind(linked_user_id)
    .bind(manager_id)
    .bind("#ff9900")
    .bind(noon())
    .bind(noon())
    .fetch_one(pool)
    .await
    .expect("insert child profile")
}

pub async fn count_samples(pool: &SqlitePool, subject_id: &str) -> i64 {
    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM location_samples WHERE subject_id = ?")
            .bind(subject_id)
            .fetch_one(pool)
            .await
            .expect("count samples");
    count
}

/// Sign a bearer token the way the account service does. Expiry is checked
/// against the real clock by `jsonwebtoken`, not the test clock.
pub fn issue_token(state: &Arc<AppState>, member_id: &str) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &Claims {
            sub: member_id.to_string(),
            iat: now,
            exp: now + 3600,
        },
        &jsonwebtoken::EncodingKey::from_secret(state.config.jwt.secret.as_bytes()),
    )
    .expect("sign token")
}

/// The API routes as mounted by `main`, without the rate limiter.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(routes::health::health_check))
        .nest("/api/locations", routes::locations::router())
        .nest("/api/geofences", routes::geofences::router())
        .with_state(state)
}

/// Send one request through the router; an empty response body reads as `null`.
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    use tower::ServiceExt;

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
