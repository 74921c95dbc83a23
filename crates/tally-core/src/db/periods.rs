//! Period catalog: which months an owner has recorded anything in

use rusqlite::params;

use super::{period_column, Database};
use crate::error::Result;
use crate::models::Owner;
use crate::period::Period;

impl Database {
    /// Distinct periods across incomes and both expense tables, newest first
    pub fn list_available_periods(&self, owner: &Owner) -> Result<Vec<Period>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT period FROM incomes WHERE owner = ?1
            UNION
            SELECT period FROM fixed_expenses WHERE owner = ?1
            UNION
            SELECT period FROM variable_expenses WHERE owner = ?1
            ORDER BY period DESC
            "#,
        )?;

        let periods = stmt
            .query_map(params![owner.as_str()], |row| period_column(row, 0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(periods)
    }
}
