//! Per-owner display preferences

use rusqlite::{params, OptionalExtension};
use tracing::warn;

use super::{parse_datetime, Database};
use crate::currency::{parse_currency, CurrencyCode};
use crate::error::Result;
use crate::models::{Owner, UserPreference};

impl Database {
    /// The owner's preferred currency, or CRC when none is stored
    pub fn get_preference(&self, owner: &Owner) -> Result<CurrencyCode> {
        Ok(self
            .get_user_preference(owner)?
            .map(|p| p.preferred_currency)
            .unwrap_or_default())
    }

    /// The stored preference row, if the owner ever set one
    pub fn get_user_preference(&self, owner: &Owner) -> Result<Option<UserPreference>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT owner, preferred_currency, created_at, updated_at
                FROM user_preferences WHERE owner = ?
                "#,
                params![owner.as_str()],
                |row| {
                    let code: String = row.get(1)?;
                    let created_at_str: String = row.get(2)?;
                    let updated_at_str: String = row.get(3)?;
                    Ok((row.get::<_, String>(0)?, code, created_at_str, updated_at_str))
                },
            )
            .optional()?;

        Ok(row.map(|(owner, code, created_at, updated_at)| {
            let preferred_currency = code.parse().unwrap_or_else(|_| {
                warn!(code = %code, "Unknown stored currency, using default");
                CurrencyCode::default()
            });
            UserPreference {
                owner,
                preferred_currency,
                created_at: parse_datetime(&created_at),
                updated_at: parse_datetime(&updated_at),
            }
        }))
    }

    /// Validate and store the owner's preferred currency
    ///
    /// Unknown codes are rejected before anything is written.
    pub fn set_preference(&self, owner: &Owner, code: &str) -> Result<UserPreference> {
        let currency = parse_currency(code)?;

        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO user_preferences (owner, preferred_currency)
            VALUES (?, ?)
            ON CONFLICT(owner) DO UPDATE SET
                preferred_currency = excluded.preferred_currency,
                updated_at = CURRENT_TIMESTAMP
            "#,
            params![owner.as_str(), currency.as_str()],
        )?;
        drop(conn);

        self.get_user_preference(owner)?.ok_or_else(|| {
            crate::error::Error::InvalidData("preference missing after upsert".to_string())
        })
    }
}
