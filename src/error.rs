//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, info, warn};

/// definitions for the promptframe application.
#[derive(Debug)]
pub enum AppError {
    /// When you didn't do the right thing
    BadRequest(String),
    /// When a requested resource is not found
    NotFound(String),
    /// Transport failure or non-success status from the generation API
    Upstream {
        /// HTTP status, if a response came back at all
        status: Option<u16>,
        /// Raw upstream body or transport error text
        body: String,
    },
    /// The generation API answered but carried no image; holds the raw response
    NoImageReturned(String),
    /// When DB operations fail
    DatabaseError(sea_orm::DbErr),
    /// Object storage failed
    Storage(String),
    /// When an internal server error occurs
    InternalServerError(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "bad request: {msg}"),
            AppError::NotFound(what) => write!(f, "not found: {what}"),
            AppError::Upstream {
                status: Some(status),
                body,
            } => write!(f, "upstream returned {status}: {body}"),
            AppError::Upstream { status: None, body } => write!(f, "upstream unreachable: {body}"),
            AppError::NoImageReturned(_) => write!(f, "upstream returned no image"),
            AppError::DatabaseError(err) => write!(f, "database error: {err}"),
            AppError::Storage(msg) => write!(f, "storage error: {msg}"),
            AppError::InternalServerError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<axum::http::Error> for AppError {
    fn from(err: axum::http::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn json_error(status: StatusCode, error: &str, details: Option<String>) -> Response {
    (status, Json(ErrorBody { error, details })).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(message) => {
                info!("Bad request received: {}", message);
                json_error(StatusCode::BAD_REQUEST, &message, None)
            }
            AppError::NotFound(what) => {
                info!("404 {what}");
                json_error(StatusCode::NOT_FOUND, "Not found", None)
            }
            AppError::Upstream { status, body } => {
                warn!("Upstream error (status {:?}): {}", status, body);
                json_error(StatusCode::BAD_GATEWAY, "Upstream error", Some(body))
            }
            AppError::NoImageReturned(raw) => {
                warn!("Upstream returned no image: {}", raw);
                json_error(StatusCode::BAD_GATEWAY, "No image returned", Some(raw))
            }
            AppError::DatabaseError(err) => {
                error!("Database error: {}", err);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Database error", None)
            }
            AppError::Storage(message) => {
                error!("Storage error: {}", message);
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "Storage error", None)
            }
            AppError::InternalServerError(message) => {
                error!("Internal server error: {}", message);
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    None,
                )
            }
        }
    }
}
