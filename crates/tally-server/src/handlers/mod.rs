//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

use axum::extract::{FromRequestParts, Request};
use serde::de::DeserializeOwned;
use tally_core::Owner;
use tracing::warn;

use crate::{AppError, AppState, MAX_BODY_SIZE};

pub mod audit;
pub mod auth;
pub mod expenses;
pub mod incomes;
pub mod months;
pub mod preferences;

// Re-export all handlers for use in router
pub use audit::*;
pub use auth::*;
pub use expenses::*;
pub use incomes::*;
pub use months::*;
pub use preferences::*;

/// Read and deserialize a JSON request body
pub(crate) async fn read_json<T: DeserializeOwned>(request: Request) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_SIZE)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::bad_request(&format!("Invalid JSON: {}", e)))
}

/// Path extractor that rejects with the JSON error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query extractor that rejects with the JSON error body
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

/// Audit a write that has already committed
///
/// A failed audit insert is logged and does not change the response.
pub(crate) fn audit_write(
    state: &AppState,
    owner: &Owner,
    action: &str,
    entity_type: &str,
    entity_id: Option<i64>,
    details: &str,
) {
    if let Err(e) = state
        .db
        .log_audit(owner, action, Some(entity_type), entity_id, Some(details))
    {
        warn!(error = %e, owner = %owner, action, entity_type, "Failed to write audit entry");
    }
}
