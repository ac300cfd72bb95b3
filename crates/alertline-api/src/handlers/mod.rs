//! HTTP handlers.

pub mod basic;
pub mod reports;

use axum::Json;

use crate::models::{ApiResponse, ErrorResponse};

pub use crate::server::ServerState;

/// Result type for handlers returning the response envelope.
pub type HandlerResult<T> = Result<Json<ApiResponse<T>>, ErrorResponse>;

pub fn ok<T: serde::Serialize>(data: T) -> HandlerResult<T> {
    Ok(Json(ApiResponse::success(data)))
}
