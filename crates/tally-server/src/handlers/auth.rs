//! Authentication-related handlers

use axum::{extract::Request, Json};
use serde::Serialize;

use crate::{AppError, Session};

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// The authenticated owner identity
    pub user: String,
    /// How the user was authenticated
    pub auth_method: String,
}

/// Get the currently authenticated user
pub async fn get_me(request: Request) -> Result<Json<MeResponse>, AppError> {
    let session = request
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or(tally_core::Error::Unauthenticated)?;

    Ok(Json(MeResponse {
        user: session.owner.to_string(),
        auth_method: session.method.as_str().to_string(),
    }))
}
