#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced column does not exist.
    Lookup,
    /// The operation does not support the column's kind.
    Type,
    /// A malformed argument.
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int64,
    Float64,
    Utf8,
}

impl DType {
    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Int64 | Self::Float64)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Utf8 => "utf8",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Utf8(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric view of the value. Booleans are not numeric here.
    pub fn to_f64(&self) -> Result<f64, TypeError> {
        match self {
            Self::Int64(v) => Ok(*v as f64),
            Self::Float64(v) => Ok(*v),
            Self::Null => Err(TypeError::ValueIsMissing),
            other => Err(TypeError::NonNumericValue {
                value: other.to_string(),
                dtype: other.dtype(),
            }),
        }
    }

    /// Equality that treats `Int64(2)` and `Float64(2.0)` as equal and NaN as equal to NaN.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float64(a), Self::Float64(b)) => (a.is_nan() && b.is_nan()) || a == b,
            (Self::Int64(a), Self::Float64(b)) | (Self::Float64(b), Self::Int64(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Ordering between two non-missing values of compatible kinds.
    ///
    /// Returns `None` when the kinds cannot be compared (text against a number, say).
    #[must_use]
    pub fn partial_cmp_value(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int64(a), Self::Int64(b)) => Some(a.cmp(b)),
            (Self::Utf8(a), Self::Utf8(b)) => Some(a.cmp(b)),
            (Self::Float64(_) | Self::Int64(_), Self::Float64(_) | Self::Int64(_)) => {
                let (a, b) = (self.to_f64().ok()?, other.to_f64().ok()?);
                // NaN sorts above every number; -0.0 ties with 0.0.
                Some(a.partial_cmp(&b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int64(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Hashable identity of a scalar, used for grouping, joining and distinct counts.
///
/// Floats hash by bit pattern after folding `-0.0` into `0.0` and every NaN into one NaN.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKey {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(u64),
    Utf8(String),
}

impl From<&Scalar> for ScalarKey {
    fn from(value: &Scalar) -> Self {
        match value {
            Scalar::Null => Self::Null,
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int64(*v),
            Scalar::Float64(v) => {
                let canonical = if v.is_nan() {
                    f64::NAN
                } else if *v == 0.0 {
                    0.0
                } else {
                    *v
                };
                Self::Float64(canonical.to_bits())
            }
            Scalar::Utf8(v) => Self::Utf8(v.clone()),
        }
    }
}

impl ScalarKey {
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("cannot cast value of dtype {from} to {to}")]
    InvalidCast { from: DType, to: DType },
    #[error("cannot parse {value:?} as {to}")]
    Unparseable { value: String, to: DType },
    #[error("cannot cast non-finite float {value} to int64")]
    NonFiniteToInt { value: f64 },
    #[error("value {value:?} has non-numeric dtype {dtype}")]
    NonNumericValue { value: String, dtype: DType },
    #[error("value is missing")]
    ValueIsMissing,
}

impl TypeError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Type
    }
}

/// Narrowest kind able to hold values of both kinds.
///
/// Integers widen to floats; any other mix falls back to text.
#[must_use]
pub fn common_dtype(left: DType, right: DType) -> DType {
    use DType::{Float64, Int64, Null, Utf8};

    match (left, right) {
        (a, b) if a == b => a,
        (Null, other) | (other, Null) => other,
        (Int64, Float64) | (Float64, Int64) => Float64,
        _ => Utf8,
    }
}

/// Unified kind of a value sequence, `DType::Null` when every value is missing.
#[must_use]
pub fn infer_dtype<'a>(values: impl IntoIterator<Item = &'a Scalar>) -> DType {
    values
        .into_iter()
        .fold(DType::Null, |acc, value| common_dtype(acc, value.dtype()))
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Cast a scalar to a target dtype. Missing values stay missing.
pub fn cast_scalar(value: &Scalar, target: DType) -> Result<Scalar, TypeError> {
    let from = value.dtype();
    if value.is_missing() || from == target {
        return Ok(value.clone());
    }

    match (value, target) {
        (_, DType::Null) => Ok(Scalar::Null),
        (_, DType::Utf8) => Ok(Scalar::Utf8(value.to_string())),

        (Scalar::Int64(v), DType::Float64) => Ok(Scalar::Float64(*v as f64)),
        (Scalar::Int64(v), DType::Bool) => Ok(Scalar::Bool(*v != 0)),

        (Scalar::Float64(v), DType::Int64) => {
            if !v.is_finite() {
                return Err(TypeError::NonFiniteToInt { value: *v });
            }
            Ok(Scalar::Int64(v.trunc() as i64))
        }
        (Scalar::Float64(v), DType::Bool) => Ok(Scalar::Bool(*v != 0.0)),

        (Scalar::Bool(v), DType::Int64) => Ok(Scalar::Int64(i64::from(*v))),
        (Scalar::Bool(v), DType::Float64) => Ok(Scalar::Float64(if *v { 1.0 } else { 0.0 })),

        (Scalar::Utf8(s), DType::Int64) => s
            .trim()
            .parse::<i64>()
            .map(Scalar::Int64)
            .map_err(|_| TypeError::Unparseable {
                value: s.clone(),
                to: target,
            }),
        (Scalar::Utf8(s), DType::Float64) => s
            .trim()
            .parse::<f64>()
            .map(Scalar::Float64)
            .map_err(|_| TypeError::Unparseable {
                value: s.clone(),
                to: target,
            }),
        (Scalar::Utf8(s), DType::Bool) => {
            parse_bool(s)
                .map(Scalar::Bool)
                .ok_or_else(|| TypeError::Unparseable {
                    value: s.clone(),
                    to: target,
                })
        }

        _ => Err(TypeError::InvalidCast { from, to: target }),
    }
}

// ── Numeric kernels over non-null values ───────────────────────────────

#[must_use]
pub fn nansum(values: &[f64]) -> f64 {
    values.iter().sum()
}

#[must_use]
pub fn nanmean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(nansum(values) / values.len() as f64)
}

#[must_use]
pub fn nanmin(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

#[must_use]
pub fn nanmax(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Median; even-sized inputs average the two middle values.
#[must_use]
pub fn nanmedian(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let nums = sorted(values);
    let mid = nums.len() / 2;
    if nums.len().is_multiple_of(2) {
        Some((nums[mid - 1] + nums[mid]) / 2.0)
    } else {
        Some(nums[mid])
    }
}

/// Variance with `ddof` delta degrees of freedom. `None` when `len <= ddof`.
#[must_use]
pub fn nanvar(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let mean = nanmean(values)?;
    let sum_sq: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    Some(sum_sq / (values.len() - ddof) as f64)
}

#[must_use]
pub fn nanstd(values: &[f64], ddof: usize) -> Option<f64> {
    nanvar(values, ddof).map(f64::sqrt)
}

/// Linear interpolation between order statistics of an ascending slice.
#[must_use]
pub fn quantile_sorted(sorted_values: &[f64], q: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    let pos = q * (sorted_values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    if lower == upper {
        return Some(sorted_values[lower]);
    }
    let weight = pos - lower as f64;
    Some(sorted_values[lower] * (1.0 - weight) + sorted_values[upper] * weight)
}

#[must_use]
pub fn nanquantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

fn standardized_moment(values: &[f64], power: i32) -> Option<f64> {
    let mean = nanmean(values)?;
    let std = nanstd(values, 0)?;
    if std == 0.0 {
        return None;
    }
    let n = values.len() as f64;
    Some(values.iter().map(|x| ((x - mean) / std).powi(power)).sum::<f64>() / n)
}

/// Population skewness. `0.0` below three values or at zero variance.
#[must_use]
pub fn skewness(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    standardized_moment(values, 3).unwrap_or(0.0)
}

/// Population excess kurtosis. `0.0` below four values or at zero variance.
#[must_use]
pub fn excess_kurtosis(values: &[f64]) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    standardized_moment(values, 4).map_or(0.0, |m| m - 3.0)
}
