//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::CurrencyCode;
use crate::error::{Error, Result};
use crate::period::Period;

/// The authenticated identity that owns records and preferences
///
/// Only produced from a resolved session, never from request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
    /// Resolve an owner from the session identity, if there is one
    pub fn from_session(identity: Option<&str>) -> Result<Self> {
        match identity.map(str::trim) {
            Some(id) if !id.is_empty() => Ok(Self(id.to_string())),
            _ => Err(Error::Unauthenticated),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which expense table a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKind {
    /// Recurring commitments (rent, utilities, subscriptions)
    Fixed,
    /// Month-to-month spending
    Variable,
}

impl ExpenseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Variable => "variable",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed_expenses",
            Self::Variable => "variable_expenses",
        }
    }

    /// Name used in audit entries and error messages
    pub fn entity_name(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed_expense",
            Self::Variable => "variable_expense",
        }
    }
}

impl std::str::FromStr for ExpenseKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fixed" | "fixed_expense" | "fixed-expenses" => Ok(Self::Fixed),
            "variable" | "variable_expense" | "variable-expenses" => Ok(Self::Variable),
            _ => Err(format!("Unknown expense kind: {}", s)),
        }
    }
}

impl std::fmt::Display for ExpenseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An income entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Income {
    pub id: i64,
    pub owner: String,
    pub date: NaiveDate,
    pub income_source: String,
    pub category: String,
    pub amount: Decimal,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new income entry, as submitted by a client
#[derive(Debug, Clone, Deserialize)]
pub struct NewIncome {
    pub date: String,
    pub income_source: String,
    pub category: String,
    pub amount: Decimal,
    pub period: String,
}

/// Partial update of an income entry; absent fields stay unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomePatch {
    pub date: Option<String>,
    pub income_source: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub period: Option<String>,
}

/// A fixed or variable expense entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    pub id: i64,
    pub owner: String,
    pub kind: ExpenseKind,
    pub date: NaiveDate,
    pub expense_source: String,
    pub amount: Decimal,
    pub period: Period,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new expense entry
#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub date: String,
    pub expense_source: String,
    pub amount: Decimal,
    pub period: String,
}

/// Partial update of an expense entry
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpensePatch {
    pub date: Option<String>,
    pub expense_source: Option<String>,
    pub amount: Option<Decimal>,
    pub period: Option<String>,
}

/// Materialized monthly totals for one (owner, period)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: i64,
    pub owner: String,
    pub period: Period,
    pub total_income: Decimal,
    pub total_fixed_expense: Decimal,
    pub total_variable_expense: Decimal,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything shown for one month
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyBundle {
    pub period: Period,
    pub incomes: Vec<Income>,
    pub fixed_expenses: Vec<Expense>,
    pub variable_expenses: Vec<Expense>,
    /// None until the first record of the month is written
    pub summary: Option<Summary>,
}

/// A written record together with the recomputed summary of its period
#[derive(Debug, Clone, Serialize)]
pub struct RecordChange<T> {
    pub record: T,
    pub summary: Summary,
}

/// Stored display preferences for an owner
#[derive(Debug, Clone, Serialize)]
pub struct UserPreference {
    pub owner: String,
    pub preferred_currency: CurrencyCode,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Suggested income categories offered by clients
pub const INCOME_CATEGORIES: [&str; 8] = [
    "Salary",
    "Freelance",
    "Investments",
    "Bonus",
    "Commissions",
    "Sales",
    "Rent",
    "Other",
];

/// Round to cents and pin the scale so "300" is stored as "300.00"
pub fn to_cents(value: Decimal) -> Decimal {
    let mut v = value.round_dp(2);
    v.rescale(2);
    v
}
