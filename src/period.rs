//! Period types and the active-period resolver.
//!
//! Every report in the crate is scoped by an [`ActivePeriod`], resolved from a
//! [`ViewMode`] and the (possibly simulated) current date.

use crate::error::{Result, SalesEngineError};
use crate::utils::{end_of_day, last_day_of_month, next_month, parse_loose_datetime, prev_month, start_of_day};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use schemars::gen::SchemaGenerator;
use schemars::schema::{Metadata, Schema};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MonthPeriod {
    year: i32,
    month: u32,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(SalesEngineError::InvalidPeriod(format!(
                "{:04}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn previous(&self) -> Self {
        let (year, month) = prev_month(self.year, self.month);
        Self { year, month }
    }

    pub fn next(&self) -> Self {
        let (year, month) = next_month(self.year, self.month);
        Self { year, month }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        last_day_of_month(self.year, self.month)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for MonthPeriod {
    type Err = SalesEngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SalesEngineError::InvalidPeriod(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;

        if !is_digits(year, 4) || !is_digits(month, 2) {
            return Err(invalid());
        }

        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }
}

impl TryFrom<String> for MonthPeriod {
    type Error = SalesEngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MonthPeriod> for String {
    fn from(value: MonthPeriod) -> Self {
        value.to_string()
    }
}

impl JsonSchema for MonthPeriod {
    fn schema_name() -> String {
        "MonthPeriod".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        string_schema(gen, r"^\d{4}-\d{2}$", "Calendar month in YYYY-MM format")
    }
}

/// Goal scoping unit: a month (`YYYY-MM`) or a whole year (`YYYY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Period {
    Month(MonthPeriod),
    Year(i32),
}

impl Period {
    pub fn year(&self) -> i32 {
        match self {
            Period::Month(month) => month.year(),
            Period::Year(year) => *year,
        }
    }

    pub fn as_month(&self) -> Option<MonthPeriod> {
        match self {
            Period::Month(month) => Some(*month),
            Period::Year(_) => None,
        }
    }

    /// Whether a sale dated `date` falls inside this period.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Period::Month(month) => month.contains(date),
            Period::Year(year) => date.year() == *year,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Month(month) => write!(f, "{}", month),
            Period::Year(year) => write!(f, "{:04}", year),
        }
    }
}

impl FromStr for Period {
    type Err = SalesEngineError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if is_digits(trimmed, 4) {
            let year = trimmed
                .parse::<i32>()
                .map_err(|_| SalesEngineError::InvalidPeriod(s.to_string()))?;
            return Ok(Period::Year(year));
        }
        trimmed.parse().map(Period::Month)
    }
}

impl TryFrom<String> for Period {
    type Error = SalesEngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.to_string()
    }
}

impl From<MonthPeriod> for Period {
    fn from(value: MonthPeriod) -> Self {
        Period::Month(value)
    }
}

impl JsonSchema for Period {
    fn schema_name() -> String {
        "Period".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        string_schema(
            gen,
            r"^\d{4}(-\d{2})?$",
            "YYYY-MM for a monthly period, YYYY for an annual one",
        )
    }
}

fn string_schema(gen: &mut SchemaGenerator, pattern: &str, description: &str) -> Schema {
    let mut schema = String::json_schema(gen).into_object();
    schema.string().pattern = Some(pattern.to_string());
    schema.metadata = Some(Box::new(Metadata {
        description: Some(description.to_string()),
        ..Default::default()
    }));
    Schema::Object(schema)
}

/// How the dashboard picks its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ViewMode {
    /// The in-progress month of the simulated date.
    Live,
    /// An explicitly selected month.
    Period { selected: MonthPeriod },
    /// An explicit inclusive day range.
    Range { start: NaiveDate, end: NaiveDate },
}

impl Default for ViewMode {
    fn default() -> Self {
        Self::Live
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Window {
    Month,
    Range {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// The resolved filter window used by aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePeriod {
    pub month_period: MonthPeriod,
    pub year_period: i32,
    window: Window,
}

impl ActivePeriod {
    pub fn resolve(mode: &ViewMode, simulated_date: NaiveDate) -> Self {
        match mode {
            ViewMode::Live => Self::for_month(MonthPeriod::from_date(simulated_date)),
            ViewMode::Period { selected } => Self::for_month(*selected),
            ViewMode::Range { start, end } => {
                let (start, end) = if start <= end {
                    (*start, *end)
                } else {
                    (*end, *start)
                };
                let month_period = MonthPeriod::from_date(start);
                Self {
                    month_period,
                    year_period: month_period.year(),
                    window: Window::Range {
                        start: start_of_day(start),
                        end: end_of_day(end),
                    },
                }
            }
        }
    }

    /// Historical view of one month, as used by the month close.
    pub fn for_month(month_period: MonthPeriod) -> Self {
        Self {
            month_period,
            year_period: month_period.year(),
            window: Window::Month,
        }
    }

    pub fn year_label(&self) -> String {
        format!("{:04}", self.year_period)
    }

    pub fn is_range(&self) -> bool {
        matches!(self.window, Window::Range { .. })
    }

    /// String-level matching used for goal periods and raw dates. Never fails:
    /// anything unparseable simply does not match.
    pub fn is_date_in_period(&self, value: &str) -> bool {
        if value.len() == 4 {
            return value == self.year_label();
        }

        match &self.window {
            Window::Month => value.starts_with(&self.month_period.to_string()),
            Window::Range { start, end } => match parse_loose_datetime(value) {
                Some(dt) => *start <= dt && dt <= *end,
                None => false,
            },
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        match &self.window {
            Window::Month => self.month_period.contains(date),
            Window::Range { start, end } => {
                let dt = start_of_day(date);
                *start <= dt && dt <= *end
            }
        }
    }

    pub fn matches_period(&self, period: &Period) -> bool {
        self.is_date_in_period(&period.to_string())
    }
}

pub fn resolve_active_period(mode: &ViewMode, simulated_date: NaiveDate) -> ActivePeriod {
    ActivePeriod::resolve(mode, simulated_date)
}
