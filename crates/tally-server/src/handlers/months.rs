//! Month handlers: available periods, monthly bundle, summary and analysis

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::Serialize;

use super::Path;
use crate::{request_owner, AppError, AppState};
use tally_core::{MonthlyBundle, Period, Summary, SummaryAnalysis};

/// A month that has at least one record
#[derive(Serialize)]
pub struct MonthEntry {
    pub period: Period,
    pub label: String,
    /// Three-letter month for compact pickers
    pub short_label: &'static str,
}

/// GET /api/months - Periods with records, newest first
pub async fn list_months(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<Vec<MonthEntry>>, AppError> {
    let owner = request_owner(&request)?;

    let months: Vec<MonthEntry> = state
        .db
        .list_available_periods(&owner)?
        .into_iter()
        .map(|period| MonthEntry {
            label: period.label(),
            short_label: period.short_label(),
            period,
        })
        .collect();

    state.db.log_audit(
        &owner,
        "list",
        Some("period"),
        None,
        Some(&format!("count={}", months.len())),
    )?;

    Ok(Json(months))
}

/// GET /api/months/:period - Incomes, expenses and summary for one month
pub async fn get_month(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
    request: Request,
) -> Result<Json<MonthlyBundle>, AppError> {
    let owner = request_owner(&request)?;
    let period = Period::parse(&period)?;

    let bundle = state.db.get_monthly_bundle(&owner, &period)?;

    state.db.log_audit(
        &owner,
        "get",
        Some("month"),
        None,
        Some(&format!("period={}", period)),
    )?;

    Ok(Json(bundle))
}

/// GET /api/months/:period/summary - Stored summary, or null if the month was never summarized
pub async fn get_month_summary(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
    request: Request,
) -> Result<Json<Option<Summary>>, AppError> {
    let owner = request_owner(&request)?;
    let period = Period::parse(&period)?;

    let summary = state.db.get_summary(&owner, &period)?;

    state.db.log_audit(
        &owner,
        "get",
        Some("summary"),
        summary.as_ref().map(|s| s.id),
        Some(&format!("period={}", period)),
    )?;

    Ok(Json(summary))
}

/// GET /api/months/:period/analysis - Financial health of a month
pub async fn get_month_analysis(
    State(state): State<Arc<AppState>>,
    Path(period): Path<String>,
    request: Request,
) -> Result<Json<SummaryAnalysis>, AppError> {
    let owner = request_owner(&request)?;
    let period = Period::parse(&period)?;

    let analysis = state.db.get_analysis(&owner, &period)?;

    state.db.log_audit(
        &owner,
        "get",
        Some("analysis"),
        None,
        Some(&format!("period={}, status={}", period, analysis.status)),
    )?;

    Ok(Json(analysis))
}
