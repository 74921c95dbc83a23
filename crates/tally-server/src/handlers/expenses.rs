//! Fixed and variable expense handlers
//!
//! The same handlers serve both expense tables; the router attaches the
//! `ExpenseKind` for each mount point as a request extension.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Extension, Json,
};

use super::{audit_write, read_json, DeletedResponse, Path, PeriodQuery, Query};
use crate::{request_owner, AppError, AppState};
use tally_core::{Expense, ExpenseKind, ExpensePatch, NewExpense, RecordChange};

/// GET /api/{fixed,variable}-expenses?period=YYYY-MM - List expenses for a month
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ExpenseKind>,
    Query(params): Query<PeriodQuery>,
    request: Request,
) -> Result<Json<Vec<Expense>>, AppError> {
    let owner = request_owner(&request)?;
    let period = params.resolve()?;

    let expenses = state.db.list_expenses(&owner, kind, &period)?;

    state.db.log_audit(
        &owner,
        "list",
        Some(kind.entity_name()),
        None,
        Some(&format!("period={}, count={}", period, expenses.len())),
    )?;

    Ok(Json(expenses))
}

/// POST /api/{fixed,variable}-expenses - Record an expense
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ExpenseKind>,
    request: Request,
) -> Result<Json<RecordChange<Expense>>, AppError> {
    let owner = request_owner(&request)?;
    let req: NewExpense = read_json(request).await?;

    let change = state.db.create_expense(&owner, kind, &req)?;

    audit_write(
        &state,
        &owner,
        "create",
        kind.entity_name(),
        Some(change.record.id),
        &format!(
            "period={}, amount={}",
            change.record.period, change.record.amount
        ),
    );

    Ok(Json(change))
}

/// GET /api/{fixed,variable}-expenses/:id - Get a single expense
pub async fn get_expense(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ExpenseKind>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<Expense>, AppError> {
    let owner = request_owner(&request)?;

    let expense = state.db.get_expense(&owner, kind, id)?;

    state
        .db
        .log_audit(&owner, "get", Some(kind.entity_name()), Some(id), None)?;

    Ok(Json(expense))
}

/// PATCH /api/{fixed,variable}-expenses/:id - Change supplied fields of an expense
pub async fn update_expense(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ExpenseKind>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<RecordChange<Expense>>, AppError> {
    let owner = request_owner(&request)?;
    let patch: ExpensePatch = read_json(request).await?;

    let change = state.db.update_expense(&owner, kind, id, &patch)?;

    audit_write(
        &state,
        &owner,
        "update",
        kind.entity_name(),
        Some(id),
        &format!("period={}", change.record.period),
    );

    Ok(Json(change))
}

/// DELETE /api/{fixed,variable}-expenses/:id - Delete an expense
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(kind): Extension<ExpenseKind>,
    Path(id): Path<i64>,
    request: Request,
) -> Result<Json<DeletedResponse>, AppError> {
    let owner = request_owner(&request)?;

    let summary = state.db.delete_expense(&owner, kind, id)?;

    audit_write(
        &state,
        &owner,
        "delete",
        kind.entity_name(),
        Some(id),
        &format!("period={}", summary.period),
    );

    Ok(Json(DeletedResponse {
        success: true,
        summary,
    }))
}
