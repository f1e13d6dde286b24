// src/errors.rs

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde_json::json;
use thiserror::Error;

use crate::models::ItemStatus;

/// Request-level error taxonomy. Every variant is translated into a JSON
/// body at the boundary; rejected state transitions carry the item's current
/// authoritative status so the client can reconcile its view.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// Transition refused because of the item's current state; 409.
    #[error("{message}")]
    StateConflict { message: String, status: ItemStatus },

    /// Transition refused because of the item's current state; 400.
    #[error("{message}")]
    WrongStatus { message: String, status: ItemStatus },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("password hash error: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("token error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn not_found(msg: &str) -> Self {
        ApiError::NotFound(msg.to_string())
    }

    pub fn forbidden(msg: &str) -> Self {
        ApiError::Forbidden(msg.to_string())
    }

    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn state_conflict(msg: &str, status: ItemStatus) -> Self {
        ApiError::StateConflict {
            message: msg.to_string(),
            status,
        }
    }

    pub fn wrong_status(msg: &str, status: ItemStatus) -> Self {
        ApiError::WrongStatus {
            message: msg.to_string(),
            status,
        }
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::WrongStatus { .. } => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) | ApiError::StateConflict { .. } => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Hash(_) | ApiError::Jwt(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::StateConflict { message, status }
            | ApiError::WrongStatus { message, status } => {
                HttpResponse::build(self.status_code()).json(json!({
                    "error": message,
                    "status": status,
                }))
            }
            ApiError::Database(e) => {
                log::error!("database error: {e}");
                HttpResponse::InternalServerError().json(json!({"error": "internal error"}))
            }
            ApiError::Hash(e) => {
                log::error!("bcrypt error: {e}");
                HttpResponse::InternalServerError().json(json!({"error": "internal error"}))
            }
            ApiError::Jwt(e) => {
                log::error!("jwt error: {e}");
                HttpResponse::InternalServerError().json(json!({"error": "internal error"}))
            }
            other => HttpResponse::build(self.status_code()).json(json!({
                "error": other.to_string(),
            })),
        }
    }
}
