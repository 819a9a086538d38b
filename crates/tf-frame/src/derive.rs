//! String and datetime derivations. Each appends `<column>_<suffix>` and leaves
//! the source frame untouched.

use tf_columnar::{Column, ColumnError, DatetimeField, StrAccessor};

use crate::{DataFrame, FrameError};

impl DataFrame {
    fn derive_text<F>(&self, column: &str, suffix: &str, func: F) -> Result<Self, FrameError>
    where
        F: FnOnce(StrAccessor<'_>) -> Result<Column, ColumnError>,
    {
        let derived = func(self.require(column)?.str()?)?;
        self.with_column(format!("{column}_{suffix}"), derived)
    }

    fn derive_datetime<F>(&self, column: &str, suffix: &str, func: F) -> Result<Self, FrameError>
    where
        F: FnOnce(&Column) -> Result<Column, ColumnError>,
    {
        let mut guard = tf_runtime::begin("datetime");
        guard.rows(self.len());
        let derived = func(self.require(column)?)?;
        self.with_column(format!("{column}_{suffix}"), derived)
    }

    // ── Strings ────────────────────────────────────────────────────────

    pub fn str_upper(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "upper", |s| Ok(s.upper()))
    }

    pub fn str_lower(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "lower", |s| Ok(s.lower()))
    }

    pub fn str_strip(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "strip", |s| Ok(s.strip()))
    }

    pub fn str_replace(&self, column: &str, pattern: &str, replacement: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "replace", |s| Ok(s.replace(pattern, replacement)))
    }

    /// Parts are rejoined with [`tf_columnar::SPLIT_MARKER`].
    pub fn str_split(&self, column: &str, separator: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "split", |s| s.split(separator))
    }

    pub fn str_contains(&self, column: &str, pattern: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "contains", |s| Ok(s.contains(pattern)))
    }

    pub fn str_len(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "len", |s| Ok(s.len()))
    }

    pub fn str_cat(&self, column: &str, separator: &str) -> Result<Self, FrameError> {
        self.derive_text(column, "cat", |s| Ok(s.cat(separator)))
    }

    // ── Datetimes ──────────────────────────────────────────────────────

    /// Epoch seconds (UTC) of a text or integer column; unparseable and null rows give `0`.
    pub fn timestamps(&self, column: &str) -> Result<Vec<i64>, FrameError> {
        Ok(self.require(column)?.to_timestamps()?)
    }

    /// Append `<column>_timestamp` holding epoch seconds.
    pub fn to_timestamps(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_datetime(column, "timestamp", Column::timestamp_column)
    }

    pub fn dt_field(&self, column: &str, field: DatetimeField) -> Result<Self, FrameError> {
        self.derive_datetime(column, field.suffix(), |c| c.datetime_field(field))
    }

    pub fn dt_year(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Year)
    }

    pub fn dt_month(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Month)
    }

    pub fn dt_day(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Day)
    }

    pub fn dt_hour(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Hour)
    }

    pub fn dt_minute(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Minute)
    }

    pub fn dt_second(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::Second)
    }

    /// Sunday is `0`.
    pub fn dt_day_of_week(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::DayOfWeek)
    }

    pub fn dt_day_of_year(&self, column: &str) -> Result<Self, FrameError> {
        self.dt_field(column, DatetimeField::DayOfYear)
    }

    /// Append `<column>_diff`: seconds since the previous row, null on the first.
    pub fn dt_diff(&self, column: &str) -> Result<Self, FrameError> {
        self.derive_datetime(column, "diff", Column::timestamp_diff)
    }

    /// Append `<column>_shifted`: timestamps moved by `seconds` and re-rendered as text.
    pub fn dt_shift(&self, column: &str, seconds: i64) -> Result<Self, FrameError> {
        self.derive_datetime(column, "shifted", |c| c.shift_timestamps(seconds))
    }
}
