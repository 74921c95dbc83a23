//! Monthly summary recalculation
//!
//! A summary is never edited directly. It is rebuilt from the three record
//! tables and upserted on (owner, period), so rebuilding twice with the same
//! rows yields the same totals.

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use super::{decimal_column, parse_datetime, period_column, Database};
use crate::analysis::{analyze, SummaryAnalysis};
use crate::error::{Error, Result};
use crate::models::{to_cents, ExpenseKind, MonthlyBundle, Owner, Summary};
use crate::period::Period;

const SUMMARY_COLUMNS: &str = "id, owner, period, total_income, total_fixed_expense, \
    total_variable_expense, balance, created_at, updated_at";

fn summary_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Summary> {
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;
    Ok(Summary {
        id: row.get(0)?,
        owner: row.get(1)?,
        period: period_column(row, 2)?,
        total_income: decimal_column(row, 3)?,
        total_fixed_expense: decimal_column(row, 4)?,
        total_variable_expense: decimal_column(row, 5)?,
        balance: decimal_column(row, 6)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

/// Exact sum of the amounts in one table for (owner, period)
fn sum_amounts(conn: &Connection, table: &str, owner: &Owner, period: &Period) -> Result<Decimal> {
    let mut stmt = conn.prepare(&format!(
        "SELECT amount FROM {} WHERE owner = ? AND period = ?",
        table
    ))?;
    let amounts = stmt
        .query_map(params![owner.as_str(), period.as_str()], |row| {
            decimal_column(row, 0)
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(to_cents(amounts.into_iter().sum()))
}

fn select_summary(conn: &Connection, owner: &Owner, period: &Period) -> Result<Option<Summary>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT {} FROM summaries WHERE owner = ? AND period = ?",
                SUMMARY_COLUMNS
            ),
            params![owner.as_str(), period.as_str()],
            summary_from_row,
        )
        .optional()?)
}

impl Database {
    /// Rebuild the summary for (owner, period) from its records and upsert it
    pub fn recalculate_summary(&self, owner: &Owner, period: &Period) -> Result<Summary> {
        self.locks()
            .with_periods(owner, &[period], || self.rebuild_summary(owner, period))
    }

    /// Rebuild without taking the period lock; the caller must hold it
    fn rebuild_summary(&self, owner: &Owner, period: &Period) -> Result<Summary> {
        let mut conn = self.conn()?;
        // Take the write lock up front so the sums and the upsert see one snapshot
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let total_income = sum_amounts(&tx, "incomes", owner, period)?;
        let total_fixed = sum_amounts(&tx, ExpenseKind::Fixed.table(), owner, period)?;
        let total_variable = sum_amounts(&tx, ExpenseKind::Variable.table(), owner, period)?;
        let balance = to_cents(total_income - total_fixed - total_variable);

        tx.execute(
            r#"
            INSERT INTO summaries
                (owner, period, total_income, total_fixed_expense, total_variable_expense, balance)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner, period) DO UPDATE SET
                total_income = excluded.total_income,
                total_fixed_expense = excluded.total_fixed_expense,
                total_variable_expense = excluded.total_variable_expense,
                balance = excluded.balance,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![
                owner.as_str(),
                period.as_str(),
                total_income.to_string(),
                total_fixed.to_string(),
                total_variable.to_string(),
                balance.to_string(),
            ],
        )?;

        let summary = select_summary(&tx, owner, period)?.ok_or_else(|| {
            Error::InvalidData(format!("summary for {} missing after upsert", period))
        })?;
        tx.commit()?;

        debug!(period = %period, balance = %summary.balance, "Summary recalculated");
        Ok(summary)
    }

    /// Rebuild after a committed record change
    ///
    /// A failure here does not undo the record change; it surfaces as
    /// `Error::SummaryRecompute` so callers can tell the write landed.
    pub(crate) fn refresh_summary(&self, owner: &Owner, period: &Period) -> Result<Summary> {
        self.rebuild_summary(owner, period).map_err(|e| {
            error!(owner = %owner, period = %period, error = %e, "Summary recalculation failed after write");
            Error::SummaryRecompute {
                period: period.to_string(),
                source: Box::new(e),
            }
        })
    }

    /// Stored summary for (owner, period), if it was ever computed
    pub fn get_summary(&self, owner: &Owner, period: &Period) -> Result<Option<Summary>> {
        let conn = self.conn()?;
        select_summary(&conn, owner, period)
    }

    /// Health analysis of a month; months never summarized analyze as zero
    pub fn get_analysis(&self, owner: &Owner, period: &Period) -> Result<SummaryAnalysis> {
        let summary = self.get_summary(owner, period)?;
        Ok(analyze(period, summary.as_ref()))
    }

    /// Records of every kind plus the stored summary for one month
    pub fn get_monthly_bundle(&self, owner: &Owner, period: &Period) -> Result<MonthlyBundle> {
        Ok(MonthlyBundle {
            period: period.clone(),
            incomes: self.list_incomes(owner, period)?,
            fixed_expenses: self.list_expenses(owner, ExpenseKind::Fixed, period)?,
            variable_expenses: self.list_expenses(owner, ExpenseKind::Variable, period)?,
            summary: self.get_summary(owner, period)?,
        })
    }

    /// Rebuild every summary the owner has, including months whose records
    /// were all deleted, and return them newest first
    pub fn recalculate_all(&self, owner: &Owner) -> Result<Vec<Summary>> {
        let mut periods = self.list_available_periods(owner)?;
        for period in self.list_summary_periods(owner)? {
            if !periods.contains(&period) {
                periods.push(period);
            }
        }
        periods.sort_by(|a, b| b.cmp(a));

        let summaries = periods
            .iter()
            .map(|p| self.recalculate_summary(owner, p))
            .collect::<Result<Vec<_>>>()?;

        info!(owner = %owner, count = summaries.len(), "Recalculated summaries");
        Ok(summaries)
    }

    /// Every owner with records or summaries, for maintenance commands
    pub fn list_owners(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT owner FROM incomes
            UNION SELECT owner FROM fixed_expenses
            UNION SELECT owner FROM variable_expenses
            UNION SELECT owner FROM summaries
            ORDER BY owner
            "#,
        )?;
        let owners = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(owners)
    }

    fn list_summary_periods(&self, owner: &Owner) -> Result<Vec<Period>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT period FROM summaries WHERE owner = ?")?;
        let periods = stmt
            .query_map(params![owner.as_str()], |row| period_column(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(periods)
    }
}
