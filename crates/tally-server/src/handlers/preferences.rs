//! Currency registry and preference handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{audit_write, read_json};
use crate::{request_owner, AppError, AppState};
use tally_core::{CurrencyCode, CurrencyInfo};

/// Request body for setting the preferred currency
#[derive(Debug, Deserialize)]
pub struct SetCurrencyRequest {
    pub currency: String,
}

/// The owner's display currency with its metadata
#[derive(Serialize)]
pub struct CurrencyPreferenceResponse {
    pub currency: CurrencyCode,
    pub info: CurrencyInfo,
}

impl From<CurrencyCode> for CurrencyPreferenceResponse {
    fn from(currency: CurrencyCode) -> Self {
        Self {
            currency,
            info: currency.info(),
        }
    }
}

/// GET /api/currencies - All supported display currencies
pub async fn list_currencies() -> Json<Vec<CurrencyInfo>> {
    Json(tally_core::list_currencies())
}

/// GET /api/preferences/currency - Preferred currency (CRC when never set)
pub async fn get_currency_preference(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<CurrencyPreferenceResponse>, AppError> {
    let owner = request_owner(&request)?;

    let currency = state.db.get_preference(&owner)?;

    state
        .db
        .log_audit(&owner, "get", Some("preference"), None, None)?;

    Ok(Json(currency.into()))
}

/// PUT /api/preferences/currency - Set the preferred currency
pub async fn set_currency_preference(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<CurrencyPreferenceResponse>, AppError> {
    let owner = request_owner(&request)?;
    let req: SetCurrencyRequest = read_json(request).await?;

    let pref = state.db.set_preference(&owner, &req.currency)?;

    audit_write(
        &state,
        &owner,
        "update",
        "preference",
        None,
        &format!("currency={}", pref.preferred_currency),
    );

    Ok(Json(pref.preferred_currency.into()))
}
