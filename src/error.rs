use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared between handlers and the booking layer.
pub mod msg {
    pub const RIDE_NOT_FOUND: &str = "ride not found";
    pub const USER_NOT_FOUND: &str = "user not found";
    pub const NOT_RIDE_CREATOR: &str = "only the ride creator can do this";
    pub const NOT_ACTIVE_PARTICIPANT: &str = "not an active participant of this ride";
    pub const NOT_JOINED: &str = "you have not joined this ride";
    pub const CONTACTS_FORBIDDEN: &str = "only the creator and active participants can see contacts";
    pub const NO_PAYMENT_METHOD: &str = "no saved payment method; add a card first";
    pub const AUTOMATIC_PAYMENT_FAILED: &str =
        "automatic payment failed; the card needs confirmation or was declined";

    pub const EMAIL_EMPTY: &str = "email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "invalid email format";
    pub const NAME_EMPTY: &str = "name cannot be empty";
    pub const PHONE_EMPTY: &str = "phone cannot be empty";
    pub const INVALID_DEPARTURE_DATE: &str = "departure_date must be YYYY-MM-DD";
    pub const INVALID_DEPARTURE_TIME: &str = "departure_time must be HH:MM";
    pub const DEPARTURE_IN_PAST: &str = "departure must be in the future";

    pub const INVALID_FEE_AMOUNT: &str = "join fee amount must be a positive number of cents";
    pub const INVALID_FEE_CURRENCY: &str = "join fee currency must be a 3-letter code";

    pub const INVALID_SIGNATURE_FORMAT: &str = "invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "invalid timestamp in signature";
    pub const INVALID_WEBHOOK_SECRET: &str = "invalid webhook secret";
}

/// Why the capacity gate refused a join. Each variant is a distinct,
/// machine-readable outcome so clients can tell "full" from "already joined".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinRejection {
    #[error("ride not found")]
    RideNotFound,

    #[error("ride is not active for joining")]
    RideNotActive,

    #[error("ride is already full")]
    RideFull,

    #[error("you cannot join your own ride")]
    SelfJoin,

    #[error("you are already participating in this ride")]
    AlreadyJoined,
}

impl JoinRejection {
    pub fn code(&self) -> &'static str {
        match self {
            JoinRejection::RideNotFound => "ride_not_found",
            JoinRejection::RideNotActive => "ride_not_active",
            JoinRejection::RideFull => "ride_full",
            JoinRejection::SelfJoin => "self_join",
            JoinRejection::AlreadyJoined => "already_joined",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            JoinRejection::RideNotFound => StatusCode::NOT_FOUND,
            JoinRejection::RideNotActive
            | JoinRejection::RideFull
            | JoinRejection::SelfJoin
            | JoinRejection::AlreadyJoined => StatusCode::CONFLICT,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Join rejected: {0}")]
    Join(#[from] JoinRejection),

    /// The provider refused or could not complete a charge.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// The provider could not be reached or returned something unusable.
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, code, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", None, Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "Bad request", None, Some(msg.clone()))
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden", None, Some(msg.clone())),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", None, Some(msg.clone())),
            AppError::Join(rejection) => (
                rejection.status(),
                "Join rejected",
                Some(rejection.code()),
                Some(rejection.to_string()),
            ),
            AppError::PaymentFailed(msg) => (
                StatusCode::PAYMENT_REQUIRED,
                "Payment failed",
                None,
                Some(msg.clone()),
            ),
            AppError::PaymentProvider(msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (StatusCode::BAD_GATEWAY, "Payment provider unavailable", None, None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None, None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            code,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Turn a missing row into a 404.
pub trait OptionExt<T> {
    fn or_not_found(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn or_not_found(self, message: &str) -> Result<T> {
        self.ok_or_else(|| AppError::NotFound(message.to_string()))
    }
}
