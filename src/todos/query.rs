//! Status and creation-date filters over a todo slice.
//!
//! Dates are compared by calendar components in the time zone of the `now`
//! the caller passes in, so the same store can be viewed in local time or UTC.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::model::Todo;
use crate::error::FilterError;

/// Completion-status bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
    #[default]
    All,
    Completed,
    Pending,
}

impl StatusFilter {
    pub fn matches(&self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Completed => todo.completed,
            Self::Pending => !todo.completed,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "completed" | "done" => Ok(Self::Completed),
            "pending" | "open" => Ok(Self::Pending),
            other => Err(FilterError::UnknownStatus(other.to_string())),
        }
    }
}

/// Creation-date bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    /// Sunday through Saturday of the current week, both ends inclusive.
    Week,
    Month,
    Year,
    NextYear,
    /// Each present constraint must match. Month is 1-based.
    Custom {
        month: Option<u32>,
        year: Option<i32>,
    },
}

impl DateFilter {
    /// Build a custom filter, collapsing to `All` when nothing is selected.
    pub fn custom(month: Option<u32>, year: Option<i32>) -> Result<Self, FilterError> {
        if let Some(m) = month {
            if !(1..=12).contains(&m) {
                return Err(FilterError::MonthOutOfRange(m));
            }
        }
        Ok(match (month, year) {
            (None, None) => Self::All,
            (month, year) => Self::Custom { month, year },
        })
    }

    pub fn matches<Tz: TimeZone>(&self, created_at: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
        let created = created_at.with_timezone(&now.timezone());
        let day = created.date_naive();
        let today = now.date_naive();

        match *self {
            Self::All => true,
            Self::Today => day == today,
            Self::Week => {
                let (start, end) = week_bounds(today);
                start <= day && day <= end
            }
            Self::Month => created.month() == now.month() && created.year() == now.year(),
            Self::Year => created.year() == now.year(),
            Self::NextYear => created.year() == now.year() + 1,
            Self::Custom { month, year } => {
                month.is_none_or(|m| created.month() == m)
                    && year.is_none_or(|y| created.year() == y)
            }
        }
    }
}

impl FromStr for DateFilter {
    type Err = FilterError;

    /// Parses the named buckets. `custom` needs month/year and is built
    /// through `DateFilter::custom` instead.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "next-year" | "next_year" => Ok(Self::NextYear),
            other => Err(FilterError::UnknownDate(other.to_string())),
        }
    }
}

/// Sunday and Saturday of the week containing `today`.
pub fn week_bounds(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let offset = i64::from(today.weekday().num_days_from_sunday());
    let start = today - Duration::days(offset);
    (start, start + Duration::days(6))
}

/// A combined status + date view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TodoQuery {
    pub status: StatusFilter,
    pub date: DateFilter,
}

impl TodoQuery {
    pub fn new(status: StatusFilter, date: DateFilter) -> Self {
        Self { status, date }
    }

    pub fn matches<Tz: TimeZone>(&self, todo: &Todo, now: &DateTime<Tz>) -> bool {
        self.status.matches(todo) && self.date.matches(&todo.created_at, now)
    }

    /// Filter `todos`, keeping their order. The input is not touched.
    pub fn apply<'a, Tz: TimeZone>(&self, todos: &'a [Todo], now: &DateTime<Tz>) -> Vec<&'a Todo> {
        todos.iter().filter(|t| self.matches(t, now)).collect()
    }
}

/// Query-string form: `?status=pending&date=week` or `?month=3&year=2025`.
///
/// `month` / `year` combine only with no `date` or `date=custom`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoQueryParams {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub month: Option<u32>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl TryFrom<TodoQueryParams> for TodoQuery {
    type Error = FilterError;

    fn try_from(params: TodoQueryParams) -> Result<Self, Self::Error> {
        let status = match params.status.as_deref() {
            Some(s) => s.parse()?,
            None => StatusFilter::All,
        };
        let wants_custom = params.month.is_some() || params.year.is_some();
        let date = match params.date.as_deref() {
            Some(d) if d.trim().eq_ignore_ascii_case("custom") => {
                DateFilter::custom(params.month, params.year)?
            }
            Some(d) if wants_custom => {
                return Err(FilterError::ConflictingDate(d.trim().to_string()));
            }
            Some(d) => d.parse()?,
            None if wants_custom => DateFilter::custom(params.month, params.year)?,
            None => DateFilter::All,
        };
        Ok(Self { status, date })
    }
}

/// Distinct creation years plus the current one, newest first.
pub fn available_years<Tz: TimeZone>(todos: &[Todo], now: &DateTime<Tz>) -> Vec<i32> {
    let tz = now.timezone();
    let mut years: Vec<i32> = todos
        .iter()
        .map(|t| t.created_at.with_timezone(&tz).year())
        .chain(std::iter::once(now.year()))
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}
