use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tf_columnar::Column;
use tf_types::{Scalar, ScalarKey};

use crate::{DataFrame, FrameError};

/// Null statistics of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total_count: usize,
    pub null_count: usize,
    pub non_null_count: usize,
    /// `0.0` for an empty column.
    pub null_percentage: f64,
}

impl DataFrame {
    fn append_check(&self, column: &str, suffix: &str, flags: Vec<bool>) -> Result<Self, FrameError> {
        self.with_column(
            format!("{column}_{suffix}"),
            Column::from_bools(flags.into_iter().map(Some)),
        )
    }

    /// Append `<column>_not_null`.
    pub fn validate_not_null(&self, column: &str) -> Result<Self, FrameError> {
        let source = self.require(column)?;
        let flags = (0..source.len()).map(|row| source.is_valid(row)).collect();
        self.append_check(column, "not_null", flags)
    }

    /// Append `<column>_in_range`: `min <= value <= max`, nulls pass.
    /// A `None` bound leaves that side open.
    pub fn validate_range(
        &self,
        column: &str,
        min: Option<f64>,
        max: Option<f64>,
    ) -> Result<Self, FrameError> {
        let values = self
            .require_numeric(column, "range validation")?
            .to_f64_options("range validation")?;
        let flags = values
            .iter()
            .map(|value| {
                value.is_none_or(|v| min.is_none_or(|lo| v >= lo) && max.is_none_or(|hi| v <= hi))
            })
            .collect();
        self.append_check(column, "in_range", flags)
    }

    /// Append `<column>_matches_pattern`: substring containment, nulls pass.
    pub fn validate_pattern(&self, column: &str, pattern: &str) -> Result<Self, FrameError> {
        let matches = self.require(column)?.str()?.contains(pattern);
        let flags = matches
            .iter()
            .map(|value| matches!(value, Scalar::Null | Scalar::Bool(true)))
            .collect();
        self.append_check(column, "matches_pattern", flags)
    }

    /// Append `<column>_unique`: the first occurrence of a value passes, repeats fail.
    pub fn validate_unique(&self, column: &str) -> Result<Self, FrameError> {
        let source = self.require(column)?;
        let mut seen = HashSet::new();
        let flags = source
            .iter()
            .map(|value| value.is_missing() || seen.insert(ScalarKey::from(&value)))
            .collect();
        self.append_check(column, "unique", flags)
    }

    pub fn validation_summary(&self, column: &str) -> Result<ValidationSummary, FrameError> {
        let source = self.require(column)?;
        let total_count = source.len();
        let null_count = source.null_count();
        let null_percentage = if total_count == 0 {
            0.0
        } else {
            null_count as f64 / total_count as f64 * 100.0
        };
        Ok(ValidationSummary {
            total_count,
            null_count,
            non_null_count: total_count - null_count,
            null_percentage,
        })
    }
}
