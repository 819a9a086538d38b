use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::{Column, ColumnData, ColumnError};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse an ISO-like datetime into epoch seconds (UTC).
///
/// Empty or unparseable input yields the sentinel `0`.
#[must_use]
pub fn parse_timestamp(text: &str) -> i64 {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_suffix('Z').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return 0;
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return parsed.and_utc().timestamp();
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map_or(0, |dt| dt.and_utc().timestamp())
}

/// `%Y-%m-%d %H:%M:%S` rendering of epoch seconds; out-of-range input renders the epoch.
#[must_use]
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map_or_else(
            || "1970-01-01 00:00:00".to_owned(),
            |dt| dt.format(OUTPUT_FORMAT).to_string(),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatetimeField {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    /// Sunday is `0`.
    DayOfWeek,
    /// `1..=366`.
    DayOfYear,
}

impl DatetimeField {
    pub const ALL: [Self; 8] = [
        Self::Year,
        Self::Month,
        Self::Day,
        Self::Hour,
        Self::Minute,
        Self::Second,
        Self::DayOfWeek,
        Self::DayOfYear,
    ];

    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
            Self::Second => "second",
            Self::DayOfWeek => "day_of_week",
            Self::DayOfYear => "day_of_year",
        }
    }

    /// Field value of epoch seconds; the zero sentinel extracts as `0`.
    #[must_use]
    pub fn extract(self, timestamp: i64) -> i64 {
        if timestamp == 0 {
            return 0;
        }
        let Some(dt) = DateTime::from_timestamp(timestamp, 0) else {
            return 0;
        };
        let value = match self {
            Self::Year => return i64::from(dt.year()),
            Self::Month => dt.month(),
            Self::Day => dt.day(),
            Self::Hour => dt.hour(),
            Self::Minute => dt.minute(),
            Self::Second => dt.second(),
            Self::DayOfWeek => dt.weekday().num_days_from_sunday(),
            Self::DayOfYear => dt.ordinal(),
        };
        i64::from(value)
    }
}

impl Column {
    /// Epoch seconds per row. Text is parsed, integers are taken as-is, nulls become `0`.
    pub fn to_timestamps(&self) -> Result<Vec<i64>, ColumnError> {
        match self.data() {
            ColumnData::Utf8(values) => Ok(values
                .iter()
                .enumerate()
                .map(|(i, s)| if self.is_valid(i) { parse_timestamp(s) } else { 0 })
                .collect()),
            ColumnData::Int64(values) => Ok(values
                .iter()
                .enumerate()
                .map(|(i, v)| if self.is_valid(i) { *v } else { 0 })
                .collect()),
            _ => Err(ColumnError::UnsupportedDtype {
                op: "datetime operations",
                dtype: self.dtype(),
            }),
        }
    }

    pub fn timestamp_column(&self) -> Result<Self, ColumnError> {
        Ok(Self::from_i64s(self.to_timestamps()?.into_iter().map(Some)))
    }

    pub fn datetime_field(&self, field: DatetimeField) -> Result<Self, ColumnError> {
        let timestamps = self.to_timestamps()?;
        Ok(Self::from_i64s(
            timestamps.into_iter().map(|ts| Some(field.extract(ts))),
        ))
    }

    /// Seconds elapsed since the previous row; the first row is null.
    pub fn timestamp_diff(&self) -> Result<Self, ColumnError> {
        let timestamps = self.to_timestamps()?;
        let diffs = timestamps
            .iter()
            .enumerate()
            .map(|(i, ts)| i.checked_sub(1).map(|prev| ts - timestamps[prev]));
        Ok(Self::from_i64s(diffs))
    }

    /// Re-formatted timestamps shifted by `seconds`.
    pub fn shift_timestamps(&self, seconds: i64) -> Result<Self, ColumnError> {
        let timestamps = self.to_timestamps()?;
        Ok(Self::from_strings(
            timestamps
                .into_iter()
                .map(|ts| Some(format_timestamp(ts.saturating_add(seconds)))),
        ))
    }
}
