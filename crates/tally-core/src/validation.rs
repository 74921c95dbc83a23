//! Field-level checks shared by record creation and partial updates
//!
//! Every check runs before any write, so a rejected request leaves storage
//! untouched.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Error, Result};
use crate::models::{to_cents, ExpensePatch, IncomePatch, NewExpense, NewIncome};
use crate::period::Period;

/// Amounts must fit a numeric(12,2) column
const MAX_INTEGER_DIGITS: u32 = 10;

pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    Ok(trimmed.to_string())
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "is required"));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        Error::validation(field, format!("'{}' is not a YYYY-MM-DD date", trimmed))
    })
}

/// Accept a strictly positive amount with at most two fractional digits
pub fn check_amount(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(Error::validation(field, "must be greater than 0"));
    }
    if value.normalize().scale() > 2 {
        return Err(Error::validation(
            field,
            format!("{} has more than two decimal places", value),
        ));
    }
    if value >= Decimal::from(10_i64.pow(MAX_INTEGER_DIGITS)) {
        return Err(Error::validation(field, format!("{} is too large", value)));
    }
    Ok(to_cents(value))
}

pub fn parse_period(value: &str) -> Result<Period> {
    Period::parse(value.trim())
}

/// Income fields after validation
pub(crate) struct ValidIncome {
    pub date: NaiveDate,
    pub income_source: String,
    pub category: String,
    pub amount: Decimal,
    pub period: Period,
}

impl NewIncome {
    pub(crate) fn validate(&self) -> Result<ValidIncome> {
        Ok(ValidIncome {
            date: parse_date("date", &self.date)?,
            income_source: require_text("income_source", &self.income_source)?,
            category: require_text("category", &self.category)?,
            amount: check_amount("amount", self.amount)?,
            period: parse_period(&self.period)?,
        })
    }
}

/// Present income patch fields after validation
#[derive(Default)]
pub(crate) struct ValidIncomePatch {
    pub date: Option<NaiveDate>,
    pub income_source: Option<String>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub period: Option<Period>,
}

impl IncomePatch {
    pub(crate) fn validate(&self) -> Result<ValidIncomePatch> {
        Ok(ValidIncomePatch {
            date: self.date.as_deref().map(|d| parse_date("date", d)).transpose()?,
            income_source: self
                .income_source
                .as_deref()
                .map(|s| require_text("income_source", s))
                .transpose()?,
            category: self
                .category
                .as_deref()
                .map(|s| require_text("category", s))
                .transpose()?,
            amount: self.amount.map(|a| check_amount("amount", a)).transpose()?,
            period: self.period.as_deref().map(parse_period).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.income_source.is_none()
            && self.category.is_none()
            && self.amount.is_none()
            && self.period.is_none()
    }
}

pub(crate) struct ValidExpense {
    pub date: NaiveDate,
    pub expense_source: String,
    pub amount: Decimal,
    pub period: Period,
}

impl NewExpense {
    pub(crate) fn validate(&self) -> Result<ValidExpense> {
        Ok(ValidExpense {
            date: parse_date("date", &self.date)?,
            expense_source: require_text("expense_source", &self.expense_source)?,
            amount: check_amount("amount", self.amount)?,
            period: parse_period(&self.period)?,
        })
    }
}

#[derive(Default)]
pub(crate) struct ValidExpensePatch {
    pub date: Option<NaiveDate>,
    pub expense_source: Option<String>,
    pub amount: Option<Decimal>,
    pub period: Option<Period>,
}

impl ExpensePatch {
    pub(crate) fn validate(&self) -> Result<ValidExpensePatch> {
        Ok(ValidExpensePatch {
            date: self.date.as_deref().map(|d| parse_date("date", d)).transpose()?,
            expense_source: self
                .expense_source
                .as_deref()
                .map(|s| require_text("expense_source", s))
                .transpose()?,
            amount: self.amount.map(|a| check_amount("amount", a)).transpose()?,
            period: self.period.as_deref().map(parse_period).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_none()
            && self.expense_source.is_none()
            && self.amount.is_none()
            && self.period.is_none()
    }
}
