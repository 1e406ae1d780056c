//! Time handling for imagery acquisition dates.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Helpers for the date representations imagery catalogs return.
pub struct AcquisitionTime;

impl AcquisitionTime {
    /// ArcGIS REST date fields are milliseconds since the Unix epoch.
    pub fn from_epoch_millis(millis: i64) -> Result<DateTime<Utc>, TimeParseError> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| TimeParseError::InvalidFormat(millis.to_string()))
    }

    /// Parse an ISO 8601 datetime or plain date (assumed UTC).
    pub fn from_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }

        Err(TimeParseError::InvalidFormat(s.to_string()))
    }
}

/// A set of calendar months (1..=12) used to restrict scene acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<u32>", into = "Vec<u32>")]
pub struct MonthSet(BTreeSet<u32>);

impl MonthSet {
    pub fn new(months: impl IntoIterator<Item = u32>) -> Result<Self, TimeParseError> {
        let set: BTreeSet<u32> = months.into_iter().collect();
        if set.is_empty() {
            return Err(TimeParseError::InvalidMonth("empty month set".to_string()));
        }
        if let Some(bad) = set.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(TimeParseError::InvalidMonth(bad.to_string()));
        }
        Ok(Self(set))
    }

    /// Northern-hemisphere peak summer (July, August).
    pub fn summer() -> Self {
        Self([7, 8].into_iter().collect())
    }

    /// Parse a comma separated list such as `"7,8"`.
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        let months: Result<Vec<u32>, _> = s
            .split(',')
            .map(|m| {
                m.trim()
                    .parse::<u32>()
                    .map_err(|_| TimeParseError::InvalidMonth(m.trim().to_string()))
            })
            .collect();
        Self::new(months?)
    }

    pub fn contains(&self, month: u32) -> bool {
        self.0.contains(&month)
    }

    pub fn contains_date(&self, dt: &DateTime<Utc>) -> bool {
        self.contains(dt.month())
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    /// Render as an SQL-92 disjunction over `field`, e.g. `(Month = 7 OR Month = 8)`.
    pub fn to_where_clause(&self, field: &str) -> String {
        let terms: Vec<String> = self.0.iter().map(|m| format!("{} = {}", field, m)).collect();
        format!("({})", terms.join(" OR "))
    }
}

impl Default for MonthSet {
    fn default() -> Self {
        Self::summer()
    }
}

impl TryFrom<Vec<u32>> for MonthSet {
    type Error = TimeParseError;

    fn try_from(value: Vec<u32>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MonthSet> for Vec<u32> {
    fn from(value: MonthSet) -> Self {
        value.0.into_iter().collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid month: {0}")]
    InvalidMonth(String),
}
