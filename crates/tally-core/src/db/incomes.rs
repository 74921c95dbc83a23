//! Income operations

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::{date_column, decimal_column, parse_datetime, period_column, Database};
use crate::error::{Error, Result};
use crate::models::{Income, IncomePatch, NewIncome, Owner, RecordChange, Summary};
use crate::period::Period;

const INCOME_COLUMNS: &str =
    "id, owner, date, income_source, category, amount, period, created_at";

fn income_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Income> {
    let created_at_str: String = row.get(7)?;
    Ok(Income {
        id: row.get(0)?,
        owner: row.get(1)?,
        date: date_column(row, 2)?,
        income_source: row.get(3)?,
        category: row.get(4)?,
        amount: decimal_column(row, 5)?,
        period: period_column(row, 6)?,
        created_at: parse_datetime(&created_at_str),
    })
}

impl Database {
    /// List an owner's incomes for a period, newest date first
    pub fn list_incomes(&self, owner: &Owner, period: &Period) -> Result<Vec<Income>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM incomes WHERE owner = ? AND period = ? ORDER BY date DESC, id ASC",
            INCOME_COLUMNS
        ))?;

        let incomes = stmt
            .query_map(params![owner.as_str(), period.as_str()], income_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(incomes)
    }

    /// Get one of the owner's incomes
    pub fn get_income(&self, owner: &Owner, id: i64) -> Result<Income> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM incomes WHERE id = ? AND owner = ?",
                INCOME_COLUMNS
            ),
            params![id, owner.as_str()],
            income_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::NotFound(format!("income {}", id)))
    }

    /// Record a new income and refresh its period summary
    pub fn create_income(&self, owner: &Owner, income: &NewIncome) -> Result<RecordChange<Income>> {
        let valid = income.validate()?;

        self.locks().with_periods(owner, &[&valid.period], || -> Result<RecordChange<Income>> {
            let id = {
                let conn = self.conn()?;
                conn.execute(
                    r#"
                    INSERT INTO incomes (owner, date, income_source, category, amount, period)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                    params![
                        owner.as_str(),
                        valid.date.format("%Y-%m-%d").to_string(),
                        valid.income_source,
                        valid.category,
                        valid.amount.to_string(),
                        valid.period.as_str(),
                    ],
                )?;
                conn.last_insert_rowid()
            };
            debug!(id, period = %valid.period, "Income created");

            let record = self.get_income(owner, id)?;
            let summary = self.refresh_summary(owner, &record.period)?;
            Ok(RecordChange { record, summary })
        })
    }

    /// Change the supplied fields of an income
    ///
    /// Moving the income to another period refreshes both summaries.
    pub fn update_income(
        &self,
        owner: &Owner,
        id: i64,
        patch: &IncomePatch,
    ) -> Result<RecordChange<Income>> {
        let valid = patch.validate()?;

        loop {
            let seen = self.get_income(owner, id)?.period;
            let target = valid.period.clone().unwrap_or_else(|| seen.clone());

            let outcome = self.locks().with_periods(
                owner,
                &[&seen, &target],
                || -> Result<Option<RecordChange<Income>>> {
                    // Re-read under the lock; retry if a concurrent move changed the period
                    let current = self.get_income(owner, id)?;
                    if current.period != seen {
                        return Ok(None);
                    }

                    if !patch.is_empty() {
                        let date = valid.date.unwrap_or(current.date);
                        let income_source =
                            valid.income_source.clone().unwrap_or(current.income_source);
                        let category = valid.category.clone().unwrap_or(current.category);
                        let amount = valid.amount.unwrap_or(current.amount);

                        let conn = self.conn()?;
                        let changed = conn.execute(
                            r#"
                            UPDATE incomes
                            SET date = ?, income_source = ?, category = ?, amount = ?, period = ?
                            WHERE id = ? AND owner = ?
                            "#,
                            params![
                                date.format("%Y-%m-%d").to_string(),
                                income_source,
                                category,
                                amount.to_string(),
                                target.as_str(),
                                id,
                                owner.as_str(),
                            ],
                        )?;
                        if changed == 0 {
                            return Err(Error::NotFound(format!("income {}", id)));
                        }
                    }

                    let record = self.get_income(owner, id)?;
                    if current.period != record.period {
                        self.refresh_summary(owner, &current.period)?;
                    }
                    let summary = self.refresh_summary(owner, &record.period)?;
                    Ok(Some(RecordChange { record, summary }))
                },
            )?;

            match outcome {
                Some(change) => return Ok(change),
                None => debug!(id, "Income moved during update, retrying"),
            }
        }
    }

    /// Delete an income and return the refreshed summary of its period
    pub fn delete_income(&self, owner: &Owner, id: i64) -> Result<Summary> {
        loop {
            let seen = self.get_income(owner, id)?.period;

            let outcome = self.locks().with_periods(owner, &[&seen], || -> Result<Option<Summary>> {
                if self.get_income(owner, id)?.period != seen {
                    return Ok(None);
                }
                let deleted = {
                    let conn = self.conn()?;
                    conn.execute(
                        "DELETE FROM incomes WHERE id = ? AND owner = ?",
                        params![id, owner.as_str()],
                    )?
                };
                if deleted == 0 {
                    return Err(Error::NotFound(format!("income {}", id)));
                }
                self.refresh_summary(owner, &seen).map(Some)
            })?;

            match outcome {
                Some(summary) => return Ok(summary),
                None => debug!(id, "Income moved during delete, retrying"),
            }
        }
    }
}
