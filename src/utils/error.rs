use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Seller quota exceeded")]
    QuotaExceeded {
        quota: i32,
        tickets_sold: i32,
        requested: i32,
    },

    #[error("Event capacity exceeded")]
    CapacityExceeded { capacity: i32, tickets_issued: i32 },

    #[error("Ticket already used")]
    TicketAlreadyUsed { used_at: Option<DateTime<Utc>> },

    #[error("Ticket revoked")]
    TicketRevoked,

    #[error("Invalid status transition: {0}")]
    InvalidTransition(String),

    #[error("Link expired")]
    LinkExpired,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_)
            | AppError::QuotaExceeded { .. }
            | AppError::CapacityExceeded { .. }
            | AppError::TicketAlreadyUsed { .. }
            | AppError::TicketRevoked
            | AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::LinkExpired => StatusCode::GONE,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            AppError::Conflict(_) => "CONFLICT",
            AppError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            AppError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            AppError::TicketAlreadyUsed { .. } => "TICKET_ALREADY_USED",
            AppError::TicketRevoked => "TICKET_REVOKED",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::LinkExpired => "LINK_EXPIRED",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Message safe to hand to clients.
    pub fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidTransition(msg) => msg.clone(),
            AppError::QuotaExceeded { .. } => {
                "Ticket quota exceeded for this seller".to_string()
            }
            AppError::CapacityExceeded { .. } => "Event is sold out".to_string(),
            AppError::TicketAlreadyUsed { .. } => "Ticket has already been used".to_string(),
            AppError::MethodNotAllowed => {
                "This method is not supported for this path".to_string()
            }
            AppError::TicketRevoked => "Ticket has been revoked".to_string(),
            AppError::LinkExpired => "This link has expired".to_string(),
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            AppError::InternalServerError(_) => "An internal error occurred".to_string(),
        }
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::QuotaExceeded {
                quota,
                tickets_sold,
                requested,
            } => Some(json!({
                "quota": quota,
                "tickets_sold": tickets_sold,
                "remaining": (quota - tickets_sold).max(0),
                "requested": requested,
            })),
            AppError::CapacityExceeded {
                capacity,
                tickets_issued,
            } => Some(json!({
                "capacity": capacity,
                "tickets_issued": tickets_issued,
            })),
            AppError::TicketAlreadyUsed { used_at } => Some(json!({ "used_at": used_at })),
            _ => None,
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::InternalServerError(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            _ => {
                warn!(code = self.code(), message = %self.public_message(), "Request rejected");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        self.log();

        error_response(code, self.public_message(), self.details(), status)
    }
}
