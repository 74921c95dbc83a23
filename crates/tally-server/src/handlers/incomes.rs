//! Income handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{audit_write, read_json, Path, Query};
use crate::{request_owner, AppError, AppState};
use tally_core::{Income, IncomePatch, NewIncome, Period, RecordChange, Summary, INCOME_CATEGORIES};

/// Query parameters for record listings
#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    /// Month to list; defaults to the current month
    pub period: Option<String>,
}

impl PeriodQuery {
    pub fn resolve(&self) -> Result<Period, AppError> {
        match &self.period {
            Some(p) => Ok(Period::parse(p.trim())?),
            None => Ok(Period::current()),
        }
    }
}

/// Response for record deletion
#[derive(Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    /// Recomputed summary of the month the record belonged to
    pub summary: Summary,
}

/// GET /api/income-categories - Suggested income categories
pub async fn list_income_categories() -> Json<Vec<&'static str>> {
    Json(INCOME_CATEGORIES.to_vec())
}

/// GET /api/incomes?period=YYYY-MM - List incomes for a month
pub async fn list_incomes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PeriodQuery>,
    request: Request,
) -> Result<Json<Vec<Income>>, AppError> {
    let owner = request_owner(&request)?;
    let period = params.resolve()?;

    let incomes = state.db.list_incomes(&owner, &period)?;

    state.db.log_audit(
        &owner,
        "list",
        Some("income"),
        None,
        Some(&format!("period={}, count={}", period, incomes.len())),
    )?;

    Ok(Json(incomes))
}

/// POST /api/incomes - Record an income
pub async fn create_income(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<RecordChange<Income>>, AppError> {
    let owner = request_owner(&request)?;
    let req: NewIncome = read_json(request).await?;

    let change = state.db.create_income(&owner, &req)?;

    audit_write(
        &state,
        &owner,
        "create",
        "income",
        Some(change.record.id),
        &format!(
            "period={}, amount={}",
            change.record.period, change.record.amount
        ),
    );

    Ok(Json(change))
}

/// GET /api/incomes/:id - Get a single income
pub async fn get_income(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Income>, AppError> {
    let owner = request_owner(&request)?;

    let income = state.db.get_income(&owner, id)?;

    state
        .db
        .log_audit(&owner, "get", Some("income"), Some(id), None)?;

    Ok(Json(income))
}

/// PATCH /api/incomes/:id - Change supplied fields of an income
pub async fn update_income(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<RecordChange<Income>>, AppError> {
    let owner = request_owner(&request)?;
    let patch: IncomePatch = read_json(request).await?;

    let change = state.db.update_income(&owner, id, &patch)?;

    audit_write(
        &state,
        &owner,
        "update",
        "income",
        Some(id),
        &format!("period={}", change.record.period),
    );

    Ok(Json(change))
}

/// DELETE /api/incomes/:id - Delete an income
pub async fn delete_income(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<DeletedResponse>, AppError> {
    let owner = request_owner(&request)?;

    let summary = state.db.delete_income(&owner, id)?;

    audit_write(
        &state,
        &owner,
        "delete",
        "income",
        Some(id),
        &format!("period={}", summary.period),
    );

    Ok(Json(DeletedResponse {
        success: true,
        summary,
    }))
}
