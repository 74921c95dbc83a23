//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `incomes` - Income CRUD
//! - `expenses` - Fixed and variable expense CRUD
//! - `summaries` - Monthly summary recalculation and lookup
//! - `periods` - Months with activity
//! - `preferences` - Per-owner display currency
//! - `audit` - Owner-scoped audit log
//! - `locks` - Per-(owner, period) write serialization
//!
//! Every query is filtered by the acting owner.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rust_decimal::Decimal;
use tracing::info;

use crate::error::{Error, Result};
use crate::period::Period;

mod audit;
mod expenses;
mod incomes;
mod locks;
mod periods;
mod preferences;
mod summaries;

pub use audit::AuditEntry;
pub use locks::PeriodLocks;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"tally-salt-v1-fx";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Read a fixed-point amount stored as TEXT
pub(crate) fn decimal_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_error(idx, e))
}

pub(crate) fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

pub(crate) fn period_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Period> {
    let s: String = row.get(idx)?;
    Period::parse(&s).map_err(|e| conversion_error(idx, e))
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    locks: PeriodLocks,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `TALLY_DB_KEY` environment variable to be set.
    /// The database will be encrypted using SQLCipher with a key derived
    /// from the passphrase via Argon2.
    ///
    /// Returns an error if `TALLY_DB_KEY` is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        let encryption_key = std::env::var(DB_KEY_ENV).ok();
        match encryption_key {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    ///
    /// WARNING: This creates an unencrypted database. Only use for development
    /// or testing. For production, use `new()` with `TALLY_DB_KEY` set.
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Use with_init to set the key on every new connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager = manager.with_init(|conn| {
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                Ok(())
            });
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
            locks: PeriodLocks::default(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because SQLCipher
    /// has issues with in-memory databases in the connection pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "tally_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().into_owned();

        // Remove any existing file
        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    pub(crate) fn locks(&self) -> &PeriodLocks {
        &self.locks
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- WAL mode: readers don't block writers
            -- Note: creates -wal and -shm sidecar files alongside the database
            PRAGMA journal_mode = WAL;

            PRAGMA synchronous = NORMAL;

            PRAGMA temp_store = MEMORY;

            -- Amounts are fixed-point TEXT with exactly two decimals ("1000.00")
            -- Dates are TEXT "YYYY-MM-DD", periods are TEXT "YYYY-MM"

            -- Incomes
            CREATE TABLE IF NOT EXISTS incomes (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                date DATE NOT NULL,
                income_source TEXT NOT NULL,
                category TEXT NOT NULL,
                amount TEXT NOT NULL,
                period TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_incomes_owner_period ON incomes(owner, period);

            -- Fixed expenses
            CREATE TABLE IF NOT EXISTS fixed_expenses (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                date DATE NOT NULL,
                expense_source TEXT NOT NULL,
                amount TEXT NOT NULL,
                period TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_fixed_expenses_owner_period ON fixed_expenses(owner, period);

            -- Variable expenses
            CREATE TABLE IF NOT EXISTS variable_expenses (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                date DATE NOT NULL,
                expense_source TEXT NOT NULL,
                amount TEXT NOT NULL,
                period TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_variable_expenses_owner_period ON variable_expenses(owner, period);

            -- Monthly summaries (written only by summary recalculation)
            CREATE TABLE IF NOT EXISTS summaries (
                id INTEGER PRIMARY KEY,
                owner TEXT NOT NULL,
                period TEXT NOT NULL,
                total_income TEXT NOT NULL DEFAULT '0.00',
                total_fixed_expense TEXT NOT NULL DEFAULT '0.00',
                total_variable_expense TEXT NOT NULL DEFAULT '0.00',
                balance TEXT NOT NULL DEFAULT '0.00',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(owner, period)
            );

            -- User preferences (one row per owner)
            CREATE TABLE IF NOT EXISTS user_preferences (
                owner TEXT PRIMARY KEY,
                preferred_currency TEXT NOT NULL DEFAULT 'CRC',
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Audit log (tracks all API access per owner)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
                owner TEXT NOT NULL,
                action TEXT NOT NULL,
                entity_type TEXT,
                entity_id INTEGER,
                details TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_owner ON audit_log(owner);
            CREATE INDEX IF NOT EXISTS idx_audit_log_timestamp ON audit_log(timestamp);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
