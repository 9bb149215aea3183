pub(crate) use crate::cli::ServeMode;
pub(crate) use crate::constants::SITE_TITLE;
pub(crate) use crate::db::{ImageLocation, ImageRecord};
pub(crate) use crate::error::AppError;
pub(crate) use crate::web::AppState;
pub(crate) use askama::Template;
pub(crate) use askama_web::WebTemplate;
pub(crate) use axum::body::Body;
pub(crate) use axum::extract::{Path, State};
pub(crate) use axum::http::{HeaderMap, HeaderValue, StatusCode, header::CONTENT_TYPE};
pub(crate) use axum::response::{IntoResponse, Redirect, Response};
pub(crate) use tracing::{debug, info};
