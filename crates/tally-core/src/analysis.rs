//! Monthly financial health analysis
//!
//! Derived on read from a summary; nothing here is stored. All ratios are
//! percentages of income and are zero when the month has no income.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::models::Summary;
use crate::period::Period;

/// Savings above this share of income count as excellent
const EXCELLENT_SAVINGS_PCT: i64 = 20;
/// Fixed costs above this share of income are high
const FIXED_HIGH_PCT: i64 = 50;
/// Variable spending above this share of income is high
const VARIABLE_HIGH_PCT: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancialStatus {
    Excellent,
    Healthy,
    Critical,
}

impl FinancialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Healthy => "healthy",
            Self::Critical => "critical",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Excellent => "You are saving more than 20% of your income.",
            Self::Healthy => "Your balance is positive, but there is room to save more.",
            Self::Critical => "You are spending more than you earn. Time to adjust expenses.",
        }
    }
}

impl std::fmt::Display for FinancialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FixedLevel {
    High,
    Healthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableLevel {
    High,
    Controlled,
}

/// Single piece of advice, first matching rule wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advice {
    ReduceFixed,
    ReduceVariable,
    Deficit,
    OnTrack,
}

impl Advice {
    pub fn message(&self) -> &'static str {
        match self {
            Self::ReduceFixed => {
                "Your fixed expenses are high. Consider renegotiating services or finding cheaper alternatives."
            }
            Self::ReduceVariable => {
                "Your variable expenses are high. Review unnecessary purchases and set a monthly budget."
            }
            Self::Deficit => {
                "You are running a deficit. Cut variable expenses first and look for additional income."
            }
            Self::OnTrack => {
                "You are on track. Keep your saving habits and consider investing the surplus."
            }
        }
    }
}

/// Analysis of one month's totals
#[derive(Debug, Clone, Serialize)]
pub struct SummaryAnalysis {
    pub period: Period,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub balance: Decimal,
    pub fixed_ratio: Decimal,
    pub variable_ratio: Decimal,
    pub savings_rate: Decimal,
    pub spend_rate: Decimal,
    pub efficiency: Decimal,
    pub status: FinancialStatus,
    pub status_message: &'static str,
    pub fixed_level: FixedLevel,
    pub variable_level: VariableLevel,
    pub advice: Advice,
    pub advice_message: &'static str,
}

fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part * Decimal::ONE_HUNDRED / whole
}

fn one_decimal(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

/// Analyze a month; a missing summary counts as a month with no activity
pub fn analyze(period: &Period, summary: Option<&Summary>) -> SummaryAnalysis {
    let (income, fixed, variable, balance) = summary
        .map(|s| {
            (
                s.total_income,
                s.total_fixed_expense,
                s.total_variable_expense,
                s.balance,
            )
        })
        .unwrap_or_default();
    let total_expenses = fixed + variable;

    let fixed_ratio = percent_of(fixed, income);
    let variable_ratio = percent_of(variable, income);
    let savings_rate = percent_of(balance, income);
    let spend_rate = percent_of(total_expenses, income);

    let status = if balance > income * Decimal::from(EXCELLENT_SAVINGS_PCT) / Decimal::ONE_HUNDRED
    {
        FinancialStatus::Excellent
    } else if balance > Decimal::ZERO {
        FinancialStatus::Healthy
    } else {
        FinancialStatus::Critical
    };

    let fixed_level = if fixed_ratio > Decimal::from(FIXED_HIGH_PCT) {
        FixedLevel::High
    } else {
        FixedLevel::Healthy
    };
    let variable_level = if variable_ratio > Decimal::from(VARIABLE_HIGH_PCT) {
        VariableLevel::High
    } else {
        VariableLevel::Controlled
    };

    let advice = if fixed_level == FixedLevel::High {
        Advice::ReduceFixed
    } else if variable_level == VariableLevel::High {
        Advice::ReduceVariable
    } else if balance < Decimal::ZERO {
        Advice::Deficit
    } else {
        Advice::OnTrack
    };

    let spend_rate = one_decimal(spend_rate);
    SummaryAnalysis {
        period: period.clone(),
        total_income: income,
        total_expenses,
        balance,
        fixed_ratio: one_decimal(fixed_ratio),
        variable_ratio: one_decimal(variable_ratio),
        savings_rate: one_decimal(savings_rate),
        spend_rate,
        efficiency: Decimal::ONE_HUNDRED - spend_rate,
        status,
        status_message: status.message(),
        fixed_level,
        variable_level,
        advice,
        advice_message: advice.message(),
    }
}
