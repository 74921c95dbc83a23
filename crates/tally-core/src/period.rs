//! Calendar month periods ("YYYY-MM")
//!
//! A period is the grouping key for every record and summary. It is only a
//! label: it is never checked against the date of the record it groups.

use std::sync::OnceLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const PERIOD_PATTERN: &str = r"^[0-9]{4}-[0-9]{2}$";

fn period_regex() -> Result<&'static Regex> {
    static PERIOD_RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = PERIOD_RE.get() {
        return Ok(re);
    }
    let re = Regex::new(PERIOD_PATTERN)?;
    Ok(PERIOD_RE.get_or_init(|| re))
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A validated year-month key such as `2024-09`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period(String);

impl Period {
    /// Parse and validate a period string
    pub fn parse(s: &str) -> Result<Self> {
        if !period_regex()?.is_match(s) {
            return Err(Error::validation(
                "period",
                format!("'{}' is not in YYYY-MM format", s),
            ));
        }
        let month: u32 = s[5..7]
            .parse()
            .map_err(|_| Error::validation("period", format!("'{}' has no month", s)))?;
        if !(1..=12).contains(&month) {
            return Err(Error::validation(
                "period",
                format!("'{}' has month {} outside 01-12", s, month),
            ));
        }
        Ok(Self(s.to_string()))
    }

    /// The period containing today's date (UTC)
    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self(format!("{:04}-{:02}", today.year(), today.month()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn year(&self) -> i32 {
        self.0[..4].parse().unwrap_or_default()
    }

    /// Month number, 1-12
    pub fn month(&self) -> u32 {
        self.0[5..7].parse().unwrap_or(1)
    }

    /// Human label, e.g. "September 2024"
    pub fn label(&self) -> String {
        format!("{} {}", self.month_name(), self.year())
    }

    /// Three-letter month, e.g. "Sep"
    pub fn short_label(&self) -> &'static str {
        &self.month_name()[..3]
    }

    fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month() as usize).saturating_sub(1).min(11)]
    }
}

impl std::str::FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Period {
    type Error = Error;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.0
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
