//! Fixed and variable expense operations
//!
//! Both kinds share one row shape and differ only by table.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{date_column, decimal_column, parse_datetime, period_column, Database};
use crate::error::{Error, Result};
use crate::models::{Expense, ExpenseKind, ExpensePatch, NewExpense, Owner, RecordChange, Summary};
use crate::period::Period;

const EXPENSE_COLUMNS: &str = "id, owner, date, expense_source, amount, period, created_at";

fn expense_from_row(kind: ExpenseKind, row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    let created_at_str: String = row.get(6)?;
    Ok(Expense {
        id: row.get(0)?,
        owner: row.get(1)?,
        kind,
        date: date_column(row, 2)?,
        expense_source: row.get(3)?,
        amount: decimal_column(row, 4)?,
        period: period_column(row, 5)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn not_found(kind: ExpenseKind, id: i64) -> Error {
    Error::NotFound(format!("{} {}", kind.entity_name(), id))
}

impl Database {
    /// List an owner's expenses of one kind for a period, newest date first
    pub fn list_expenses(
        &self,
        owner: &Owner,
        kind: ExpenseKind,
        period: &Period,
    ) -> Result<Vec<Expense>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE owner = ? AND period = ? ORDER BY date DESC, id ASC",
            EXPENSE_COLUMNS,
            kind.table()
        ))?;

        let expenses = stmt
            .query_map(params![owner.as_str(), period.as_str()], |row| {
                expense_from_row(kind, row)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(expenses)
    }

    pub fn get_expense(&self, owner: &Owner, kind: ExpenseKind, id: i64) -> Result<Expense> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM {} WHERE id = ? AND owner = ?",
                EXPENSE_COLUMNS,
                kind.table()
            ),
            params![id, owner.as_str()],
            |row| expense_from_row(kind, row),
        )
        .optional()?
        .ok_or_else(|| not_found(kind, id))
    }

    /// Record a new expense and refresh its period summary
    pub fn create_expense(
        &self,
        owner: &Owner,
        kind: ExpenseKind,
        expense: &NewExpense,
    ) -> Result<RecordChange<Expense>> {
        let valid = expense.validate()?;

        self.locks().with_periods(owner, &[&valid.period], || -> Result<RecordChange<Expense>> {
            let id = {
                let conn = self.conn()?;
                conn.execute(
                    &format!(
                        "INSERT INTO {} (owner, date, expense_source, amount, period) VALUES (?, ?, ?, ?, ?)",
                        kind.table()
                    ),
                    params![
                        owner.as_str(),
                        valid.date.format("%Y-%m-%d").to_string(),
                        valid.expense_source,
                        valid.amount.to_string(),
                        valid.period.as_str(),
                    ],
                )?;
                conn.last_insert_rowid()
            };
            debug!(id, kind = %kind, period = %valid.period, "Expense created");

            let record = self.get_expense(owner, kind, id)?;
            let summary = self.refresh_summary(owner, &record.period)?;
            Ok(RecordChange { record, summary })
        })
    }

    /// Change the supplied fields of an expense
    ///
    /// Moving the expense to another period refreshes both summaries.
    pub fn update_expense(
        &self,
        owner: &Owner,
        kind: ExpenseKind,
        id: i64,
        patch: &ExpensePatch,
    ) -> Result<RecordChange<Expense>> {
        let valid = patch.validate()?;

        loop {
            let seen = self.get_expense(owner, kind, id)?.period;
            let target = valid.period.clone().unwrap_or_else(|| seen.clone());

            let outcome = self.locks().with_periods(
                owner,
                &[&seen, &target],
                || -> Result<Option<RecordChange<Expense>>> {
                    let current = self.get_expense(owner, kind, id)?;
                    if current.period != seen {
                        return Ok(None);
                    }

                    if !patch.is_empty() {
                        let date = valid.date.unwrap_or(current.date);
                        let expense_source =
                            valid.expense_source.clone().unwrap_or(current.expense_source);
                        let amount = valid.amount.unwrap_or(current.amount);

                        let conn = self.conn()?;
                        let changed = conn.execute(
                            &format!(
                                "UPDATE {} SET date = ?, expense_source = ?, amount = ?, period = ? WHERE id = ? AND owner = ?",
                                kind.table()
                            ),
                            params![
                                date.format("%Y-%m-%d").to_string(),
                                expense_source,
                                amount.to_string(),
                                target.as_str(),
                                id,
                                owner.as_str(),
                            ],
                        )?;
                        if changed == 0 {
                            return Err(not_found(kind, id));
                        }
                    }

                    let record = self.get_expense(owner, kind, id)?;
                    if current.period != record.period {
                        self.refresh_summary(owner, &current.period)?;
                    }
                    let summary = self.refresh_summary(owner, &record.period)?;
                    Ok(Some(RecordChange { record, summary }))
                },
            )?;

            match outcome {
                Some(change) => return Ok(change),
                None => debug!(id, kind = %kind, "Expense moved during update, retrying"),
            }
        }
    }

    /// Delete an expense and return the refreshed summary of its period
    pub fn delete_expense(&self, owner: &Owner, kind: ExpenseKind, id: i64) -> Result<Summary> {
        loop {
            let seen = self.get_expense(owner, kind, id)?.period;

            let outcome = self.locks().with_periods(owner, &[&seen], || -> Result<Option<Summary>> {
                if self.get_expense(owner, kind, id)?.period != seen {
                    return Ok(None);
                }
                let deleted = {
                    let conn = self.conn()?;
                    conn.execute(
                        &format!("DELETE FROM {} WHERE id = ? AND owner = ?", kind.table()),
                        params![id, owner.as_str()],
                    )?
                };
                if deleted == 0 {
                    return Err(not_found(kind, id));
                }
                self.refresh_summary(owner, &seen).map(Some)
            })?;

            match outcome {
                Some(summary) => return Ok(summary),
                None => debug!(id, kind = %kind, "Expense moved during delete, retrying"),
            }
        }
    }
}
