//! Tally Core Library
//!
//! Shared functionality for the Tally monthly finance tracker:
//! - Database access and migrations
//! - Income and fixed/variable expense records, scoped per owner
//! - Monthly summary recalculation (idempotent upsert per owner and month)
//! - Period catalog of months with activity
//! - Currency registry, formatting and per-owner display preference
//! - Financial health analysis of a month
//! - Owner-scoped audit log

pub mod analysis;
pub mod currency;
pub mod db;
pub mod error;
pub mod models;
pub mod period;
pub mod validation;

pub use analysis::{analyze, Advice, FinancialStatus, SummaryAnalysis};
pub use currency::{format_amount, list_currencies, parse_currency, CurrencyCode, CurrencyInfo};
pub use db::{AuditEntry, Database};
pub use error::{Error, Result};
pub use models::{
    Expense, ExpenseKind, ExpensePatch, Income, IncomePatch, MonthlyBundle, NewExpense,
    NewIncome, Owner, RecordChange, Summary, UserPreference, INCOME_CATEGORIES,
};
pub use period::Period;
