use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid sharing duration: {0}")]
    InvalidDuration(String),

    #[error("Location sharing is not active for this user")]
    SharingNotActive,

    #[error("Location sharing session has expired")]
    SharingExpired,

    #[error("{field} {value} is out of range")]
    CoordinateOutOfRange { field: &'static str, value: f64 },

    #[error("Subject not found: {0}")]
    SubjectNotFound(String),

    #[error("Family not found: {0}")]
    FamilyNotFound(String),

    #[error("Only parents can manage geofences")]
    UnauthorizedGeofenceMutation,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    /// Machine-readable error code exposed to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidDuration(_) => "INVALID_DURATION",
            AppError::SharingNotActive => "SHARING_NOT_ACTIVE",
            AppError::SharingExpired => "SHARING_EXPIRED",
            AppError::CoordinateOutOfRange { .. } => "COORDINATE_OUT_OF_RANGE",
            AppError::SubjectNotFound(_) => "SUBJECT_NOT_FOUND",
            AppError::FamilyNotFound(_) => "FAMILY_NOT_FOUND",
            AppError::UnauthorizedGeofenceMutation => "GEOFENCE_MUTATION_FORBIDDEN",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Jwt(_) => "INVALID_TOKEN",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) | AppError::SubjectNotFound(_) | AppError::FamilyNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::BadRequest(_)
            | AppError::InvalidDuration(_)
            | AppError::SharingNotActive
            | AppError::SharingExpired => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::CoordinateOutOfRange { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::UnauthorizedGeofenceMutation => StatusCode::FORBIDDEN,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let (message, details) = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                ("A database error occurred".to_string(), None)
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                ("An internal error occurred".to_string(), None)
            }
            AppError::Jwt(e) => {
                tracing::warn!("JWT error: {:?}", e);
                ("Invalid or expired token".to_string(), None)
            }
            AppError::NotFound(msg)
            | AppError::BadRequest(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg) => (msg.clone(), None),
            AppError::CoordinateOutOfRange { field, value } => (
                self.to_string(),
                Some(serde_json::json!({ "field": field, "value": value })),
            ),
            _ => (self.to_string(), None),
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sharing_errors_are_client_errors() {
        assert_eq!(AppError::SharingNotActive.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::SharingExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidDuration("2w".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::SharingExpired.code(), "SHARING_EXPIRED");
    }

    #[test]
    fn not_found_kinds_map_to_404() {
        assert_eq!(
            AppError::FamilyNotFound("f".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::SubjectNotFound("s".into()).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn geofence_mutation_is_forbidden() {
        let resp = AppError::UnauthorizedGeofenceMutation.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn coordinate_error_message_names_the_field() {
        let err = AppError::CoordinateOutOfRange {
            field: "latitude",
            value: 91.0,
        };
        assert_eq!(err.to_string(), "latitude 91 is out of range");
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
