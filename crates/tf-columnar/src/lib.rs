#![forbid(unsafe_code)]

mod datetime;
mod strings;

use serde::{Deserialize, Serialize};
use tf_types::{DType, ErrorKind, Scalar, TypeError, cast_scalar, infer_dtype};
use thiserror::Error;

pub use datetime::{DatetimeField, format_timestamp, parse_timestamp};
pub use strings::{SPLIT_MARKER, StrAccessor};

/// Packed per-slot validity bitmap. A set bit marks a present value.
#[derive(Debug, Clone, Default, Eq)]
pub struct ValidityMask {
    words: Vec<u64>,
    len: usize,
}

impl ValidityMask {
    #[must_use]
    pub fn from_flags(flags: &[bool]) -> Self {
        let mut mask = Self::all_invalid(flags.len());
        for (idx, &valid) in flags.iter().enumerate() {
            if valid {
                mask.words[idx / 64] |= 1_u64 << (idx % 64);
            }
        }
        mask
    }

    #[must_use]
    pub fn all_valid(len: usize) -> Self {
        let mut words = vec![u64::MAX; len.div_ceil(64)];
        let remainder = len % 64;
        if remainder > 0
            && let Some(last) = words.last_mut()
        {
            *last = (1_u64 << remainder) - 1;
        }
        Self { words, len }
    }

    #[must_use]
    pub fn all_invalid(len: usize) -> Self {
        Self {
            words: vec![0_u64; len.div_ceil(64)],
            len,
        }
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> bool {
        idx < self.len && (self.words[idx / 64] >> (idx % 64)) & 1 == 1
    }

    pub fn set(&mut self, idx: usize, valid: bool) {
        if idx >= self.len {
            return;
        }
        if valid {
            self.words[idx / 64] |= 1_u64 << (idx % 64);
        } else {
            self.words[idx / 64] &= !(1_u64 << (idx % 64));
        }
    }

    pub fn push(&mut self, valid: bool) {
        if self.len.is_multiple_of(64) {
            self.words.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, valid);
    }

    #[must_use]
    pub fn count_valid(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(|idx| self.get(idx))
    }
}

impl PartialEq for ValidityMask {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.bits().eq(other.bits())
    }
}

impl Serialize for ValidityMask {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let bits: Vec<bool> = self.bits().collect();
        bits.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ValidityMask {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = Vec::<bool>::deserialize(deserializer)?;
        Ok(Self::from_flags(&bits))
    }
}

/// Typed backing storage. Slots marked invalid hold an unspecified default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "data", rename_all = "snake_case")]
pub enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
    Utf8(Vec<String>),
}

fn gather<T: Clone + Default>(src: &[T], positions: &[Option<usize>]) -> Vec<T> {
    positions
        .iter()
        .map(|pos| pos.and_then(|p| src.get(p).cloned()).unwrap_or_default())
        .collect()
}

impl ColumnData {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Bool(_) => DType::Bool,
            Self::Utf8(_) => DType::Utf8,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(d) => d.len(),
            Self::Float64(d) => d.len(),
            Self::Bool(d) => d.len(),
            Self::Utf8(d) => d.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_capacity(dtype: DType, capacity: usize) -> Self {
        match dtype {
            DType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            DType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            DType::Bool => Self::Bool(Vec::with_capacity(capacity)),
            DType::Utf8 | DType::Null => Self::Utf8(Vec::with_capacity(capacity)),
        }
    }

    /// Append a value already cast to this storage's kind; anything else stores a default.
    fn push_scalar(&mut self, value: &Scalar) {
        match (self, value) {
            (Self::Int64(d), Scalar::Int64(v)) => d.push(*v),
            (Self::Float64(d), Scalar::Float64(v)) => d.push(*v),
            (Self::Bool(d), Scalar::Bool(v)) => d.push(*v),
            (Self::Utf8(d), Scalar::Utf8(v)) => d.push(v.clone()),
            (Self::Int64(d), _) => d.push(0),
            (Self::Float64(d), _) => d.push(0.0),
            (Self::Bool(d), _) => d.push(false),
            (Self::Utf8(d), _) => d.push(String::new()),
        }
    }

    fn scalar_at(&self, idx: usize) -> Scalar {
        match self {
            Self::Int64(d) => d.get(idx).map_or(Scalar::Null, |v| Scalar::Int64(*v)),
            Self::Float64(d) => d.get(idx).map_or(Scalar::Null, |v| Scalar::Float64(*v)),
            Self::Bool(d) => d.get(idx).map_or(Scalar::Null, |v| Scalar::Bool(*v)),
            Self::Utf8(d) => d.get(idx).map_or(Scalar::Null, |v| Scalar::Utf8(v.clone())),
        }
    }

    fn gather(&self, positions: &[Option<usize>]) -> Self {
        match self {
            Self::Int64(d) => Self::Int64(gather(d, positions)),
            Self::Float64(d) => Self::Float64(gather(d, positions)),
            Self::Bool(d) => Self::Bool(gather(d, positions)),
            Self::Utf8(d) => Self::Utf8(gather(d, positions)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ColumnError {
    #[error("column length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("{op} not supported on {dtype} columns")]
    UnsupportedDtype { op: &'static str, dtype: DType },
    #[error("cannot compare {column} column with {value} value")]
    Incomparable { column: DType, value: DType },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl ColumnError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LengthMismatch { .. } | Self::InvalidArgument(_) => ErrorKind::Value,
            Self::UnsupportedDtype { .. } | Self::Incomparable { .. } | Self::Type(_) => {
                ErrorKind::Type
            }
        }
    }
}

/// Comparison operators accepted by row filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            _ => None,
        }
    }

    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
        }
    }
}

/// A single-kind column with an independent null flag per slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnParts")]
pub struct Column {
    data: ColumnData,
    validity: ValidityMask,
}

/// Unchecked wire form of [`Column`].
#[derive(Deserialize)]
struct ColumnParts {
    data: ColumnData,
    validity: ValidityMask,
}

impl TryFrom<ColumnParts> for Column {
    type Error = ColumnError;

    fn try_from(parts: ColumnParts) -> Result<Self, Self::Error> {
        Self::new(parts.data, parts.validity)
    }
}

impl Column {
    pub fn new(data: ColumnData, validity: ValidityMask) -> Result<Self, ColumnError> {
        if data.len() != validity.len() {
            return Err(ColumnError::LengthMismatch {
                left: data.len(),
                right: validity.len(),
            });
        }
        Ok(Self { data, validity })
    }

    /// All-null column. A `Null` dtype request yields a text column.
    #[must_use]
    pub fn new_null(dtype: DType, len: usize) -> Self {
        let mut data = ColumnData::with_capacity(dtype, len);
        for _ in 0..len {
            data.push_scalar(&Scalar::Null);
        }
        Self {
            data,
            validity: ValidityMask::all_invalid(len),
        }
    }

    /// Build a column of the given kind, casting every value to it.
    pub fn from_values_as(values: &[Scalar], dtype: DType) -> Result<Self, ColumnError> {
        let mut data = ColumnData::with_capacity(dtype, values.len());
        let mut validity = ValidityMask::all_invalid(0);
        for value in values {
            let cast = cast_scalar(value, data.dtype())?;
            validity.push(!cast.is_missing());
            data.push_scalar(&cast);
        }
        Ok(Self { data, validity })
    }

    /// Build a column whose kind is inferred from the values; all-null input yields text.
    pub fn from_values(values: &[Scalar]) -> Result<Self, ColumnError> {
        Self::from_values_as(values, infer_dtype(values))
    }

    pub fn from_i64s(values: impl IntoIterator<Item = Option<i64>>) -> Self {
        let (data, validity) = split_options(values);
        Self {
            data: ColumnData::Int64(data),
            validity,
        }
    }

    pub fn from_f64s(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let (data, validity) = split_options(values);
        Self {
            data: ColumnData::Float64(data),
            validity,
        }
    }

    pub fn from_bools(values: impl IntoIterator<Item = Option<bool>>) -> Self {
        let (data, validity) = split_options(values);
        Self {
            data: ColumnData::Bool(data),
            validity,
        }
    }

    pub fn from_strings<S: Into<String>>(values: impl IntoIterator<Item = Option<S>>) -> Self {
        let (data, validity) = split_options(values.into_iter().map(|v| v.map(Into::into)));
        Self {
            data: ColumnData::Utf8(data),
            validity,
        }
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    #[must_use]
    pub fn validity(&self) -> &ValidityMask {
        &self.validity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        self.len() - self.validity.count_valid()
    }

    #[must_use]
    pub fn is_valid(&self, idx: usize) -> bool {
        self.validity.get(idx)
    }

    /// Value at `idx`; `Scalar::Null` for null slots and out-of-range positions.
    #[must_use]
    pub fn get(&self, idx: usize) -> Scalar {
        if self.validity.get(idx) {
            self.data.scalar_at(idx)
        } else {
            Scalar::Null
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Scalar> + '_ {
        (0..self.len()).map(|idx| self.get(idx))
    }

    #[must_use]
    pub fn to_values(&self) -> Vec<Scalar> {
        self.iter().collect()
    }

    /// Rough heap footprint, used for profiling.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        let payload = match &self.data {
            ColumnData::Int64(d) => d.len() * size_of::<i64>(),
            ColumnData::Float64(d) => d.len() * size_of::<f64>(),
            ColumnData::Bool(d) => d.len(),
            ColumnData::Utf8(d) => d.iter().map(|s| s.len() + size_of::<String>()).sum(),
        };
        payload + self.len().div_ceil(8)
    }

    /// Numeric view with nulls as `None`. Fails on non-numeric kinds.
    pub fn to_f64_options(&self, op: &'static str) -> Result<Vec<Option<f64>>, ColumnError> {
        match &self.data {
            ColumnData::Int64(d) => Ok(d
                .iter()
                .enumerate()
                .map(|(i, v)| self.validity.get(i).then_some(*v as f64))
                .collect()),
            ColumnData::Float64(d) => Ok(d
                .iter()
                .enumerate()
                .map(|(i, v)| self.validity.get(i).then_some(*v))
                .collect()),
            _ => Err(ColumnError::UnsupportedDtype {
                op,
                dtype: self.dtype(),
            }),
        }
    }

    /// Non-null numeric values in row order.
    pub fn valid_f64s(&self, op: &'static str) -> Result<Vec<f64>, ColumnError> {
        Ok(self.to_f64_options(op)?.into_iter().flatten().collect())
    }

    /// Gather rows by position; `None` positions become nulls.
    #[must_use]
    pub fn take_optional(&self, positions: &[Option<usize>]) -> Self {
        let validity = ValidityMask::from_flags(
            &positions
                .iter()
                .map(|pos| pos.is_some_and(|p| self.validity.get(p)))
                .collect::<Vec<_>>(),
        );
        Self {
            data: self.data.gather(positions),
            validity,
        }
    }

    #[must_use]
    pub fn take(&self, positions: &[usize]) -> Self {
        let positions: Vec<Option<usize>> = positions.iter().copied().map(Some).collect();
        self.take_optional(&positions)
    }

    pub fn filter_by_mask(&self, mask: &[bool]) -> Result<Self, ColumnError> {
        if mask.len() != self.len() {
            return Err(ColumnError::LengthMismatch {
                left: self.len(),
                right: mask.len(),
            });
        }
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        Ok(self.take(&positions))
    }

    pub fn cast(&self, dtype: DType) -> Result<Self, ColumnError> {
        if dtype == self.dtype() {
            return Ok(self.clone());
        }
        Self::from_values_as(&self.to_values(), dtype)
    }

    /// Apply `func` to every non-null value; the result kind is inferred from the outputs.
    pub fn map_valid<F>(&self, mut func: F) -> Result<Self, ColumnError>
    where
        F: FnMut(&Scalar) -> Scalar,
    {
        let mapped: Vec<Scalar> = self
            .iter()
            .map(|value| {
                if value.is_missing() {
                    Scalar::Null
                } else {
                    func(&value)
                }
            })
            .collect();
        let dtype = match infer_dtype(&mapped) {
            DType::Null => self.dtype(),
            other => other,
        };
        Self::from_values_as(&mapped, dtype)
    }

    /// Kind the column takes after filling with `fill`, or `None` if the value does not fit.
    #[must_use]
    pub fn fill_dtype(&self, fill: &Scalar) -> Option<DType> {
        match (self.dtype(), fill.dtype()) {
            (_, DType::Null) => Some(self.dtype()),
            (col, value) if col == value => Some(col),
            (DType::Int64, DType::Float64) => Some(DType::Float64),
            (DType::Float64, DType::Int64) => Some(DType::Float64),
            _ => None,
        }
    }

    pub fn fill_null(&self, fill: &Scalar) -> Result<Self, ColumnError> {
        let dtype = self.fill_dtype(fill).ok_or(ColumnError::Type(TypeError::InvalidCast {
            from: fill.dtype(),
            to: self.dtype(),
        }))?;
        let filled: Vec<Scalar> = self
            .iter()
            .map(|v| if v.is_missing() { fill.clone() } else { v })
            .collect();
        Self::from_values_as(&filled, dtype)
    }

    /// Row mask for `row <op> value`.
    ///
    /// A null `value` selects null rows under `==` and non-null rows under `!=`;
    /// otherwise null rows never match.
    pub fn compare_scalar(&self, value: &Scalar, op: ComparisonOp) -> Result<Vec<bool>, ColumnError> {
        if value.is_missing() {
            return Ok(match op {
                ComparisonOp::Eq => self.validity.bits().map(|valid| !valid).collect(),
                ComparisonOp::Ne => self.validity.bits().collect(),
                _ => vec![false; self.len()],
            });
        }

        let comparable = self.dtype() == value.dtype()
            || (self.dtype().is_numeric() && value.dtype().is_numeric());
        if !comparable {
            return Err(ColumnError::Incomparable {
                column: self.dtype(),
                value: value.dtype(),
            });
        }

        Ok(self
            .iter()
            .map(|row| {
                !row.is_missing()
                    && row
                        .partial_cmp_value(value)
                        .is_some_and(|ordering| op.holds(ordering))
            })
            .collect())
    }
}

fn split_options<T: Default>(values: impl IntoIterator<Item = Option<T>>) -> (Vec<T>, ValidityMask) {
    let mut data = Vec::new();
    let mut validity = ValidityMask::default();
    for value in values {
        validity.push(value.is_some());
        data.push(value.unwrap_or_default());
    }
    (data, validity)
}

#[cfg(test)]
mod tests {
    use super::{Column, ColumnData, ColumnError, ComparisonOp, ValidityMask};
    use tf_types::{DType, ErrorKind, Scalar};

    // ── Validity ──

    #[test]
    fn validity_mask_packs_across_word_boundary() {
        let mut flags = vec![true; 65];
        flags[3] = false;
        flags[64] = false;
        let mask = ValidityMask::from_flags(&flags);
        assert_eq!(mask.len(), 65);
        assert_eq!(mask.count_valid(), 63);
        assert!(!mask.get(3));
        assert!(!mask.get(64));
        assert!(!mask.get(200));
    }

    #[test]
    fn deserialize_rejects_mismatched_validity() {
        let col = Column::from_i64s([Some(1), None]);
        let mut wire = serde_json::to_value(&col).expect("serialize");
        assert_eq!(serde_json::from_value::<Column>(wire.clone()).expect("round trip"), col);

        wire["validity"] = serde_json::json!([true, false, true]);
        let err = serde_json::from_value::<Column>(wire).expect_err("length");
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn validity_mask_push_and_set() {
        let mut mask = ValidityMask::default();
        for i in 0..70 {
            mask.push(i % 2 == 0);
        }
        assert_eq!(mask.count_valid(), 35);
        mask.set(1, true);
        assert!(mask.get(1));
        assert_eq!(ValidityMask::all_valid(70).count_valid(), 70);
    }

    // ── Construction ──

    #[test]
    fn from_values_infers_and_tracks_nulls() {
        let col = Column::from_values(&[Scalar::Int64(1), Scalar::Null, Scalar::Float64(2.5)])
            .expect("column");
        assert_eq!(col.dtype(), DType::Float64);
        assert_eq!(col.null_count(), 1);
        assert_eq!(col.get(0), Scalar::Float64(1.0));
        assert_eq!(col.get(1), Scalar::Null);
    }

    #[test]
    fn all_null_values_become_text() {
        let col = Column::from_values(&[Scalar::Null, Scalar::Null]).expect("column");
        assert_eq!(col.dtype(), DType::Utf8);
        assert_eq!(col.null_count(), 2);
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = Column::new(ColumnData::Int64(vec![1, 2]), ValidityMask::all_valid(3))
            .expect_err("mismatch");
        assert_eq!(err.kind(), ErrorKind::Value);
    }

    #[test]
    fn take_optional_injects_nulls() {
        let col = Column::from_i64s([Some(10), None, Some(30)]);
        let out = col.take_optional(&[Some(2), None, Some(1), Some(0)]);
        assert_eq!(
            out.to_values(),
            vec![Scalar::Int64(30), Scalar::Null, Scalar::Null, Scalar::Int64(10)]
        );
    }

    // ── Cast, edit, fill ──

    #[test]
    fn cast_text_to_int_fails_on_garbage() {
        let col = Column::from_strings([Some("1"), Some("x")]);
        let err = col.cast(DType::Int64).expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn cast_preserves_nulls() {
        let col = Column::from_i64s([Some(1), None]);
        let out = col.cast(DType::Utf8).expect("cast");
        assert_eq!(out.to_values(), vec![Scalar::Utf8("1".into()), Scalar::Null]);
    }

    #[test]
    fn map_valid_skips_nulls() {
        let col = Column::from_i64s([Some(1), None, Some(3)]);
        let out = col
            .map_valid(|v| match v {
                Scalar::Int64(x) => Scalar::Int64(x * 10),
                other => other.clone(),
            })
            .expect("map");
        assert_eq!(
            out.to_values(),
            vec![Scalar::Int64(10), Scalar::Null, Scalar::Int64(30)]
        );
    }

    #[test]
    fn fill_null_widens_int_for_float_fill() {
        let col = Column::from_i64s([Some(1), None]);
        let out = col.fill_null(&Scalar::Float64(0.5)).expect("fill");
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(out.get(1), Scalar::Float64(0.5));
    }

    #[test]
    fn fill_null_rejects_text_into_numbers() {
        let col = Column::from_i64s([None]);
        let err = col.fill_null(&Scalar::Utf8("x".into())).expect_err("mismatch");
        assert!(matches!(err, ColumnError::Type(_)));
    }

    // ── Compare ──

    #[test]
    fn compare_against_null_selects_missing_rows() {
        let col = Column::from_i64s([Some(1), None, Some(3)]);
        assert_eq!(
            col.compare_scalar(&Scalar::Null, ComparisonOp::Eq).expect("eq"),
            vec![false, true, false]
        );
        assert_eq!(
            col.compare_scalar(&Scalar::Null, ComparisonOp::Ne).expect("ne"),
            vec![true, false, true]
        );
    }

    #[test]
    fn compare_excludes_nulls_from_both_branches() {
        let col = Column::from_i64s([Some(1), None, Some(3)]);
        let eq = col.compare_scalar(&Scalar::Int64(1), ComparisonOp::Eq).expect("eq");
        let ne = col.compare_scalar(&Scalar::Int64(1), ComparisonOp::Ne).expect("ne");
        assert_eq!(eq, vec![true, false, false]);
        assert_eq!(ne, vec![false, false, true]);
    }

    #[test]
    fn compare_mixes_int_and_float() {
        let col = Column::from_f64s([Some(1.5), Some(2.0)]);
        assert_eq!(
            col.compare_scalar(&Scalar::Int64(2), ComparisonOp::Ge).expect("ge"),
            vec![false, true]
        );
    }

    #[test]
    fn compare_treats_signed_zeros_as_equal() {
        let col = Column::from_f64s([Some(-0.0), Some(0.0), Some(1.0)]);
        let eq = col.compare_scalar(&Scalar::Float64(0.0), ComparisonOp::Eq).expect("eq");
        let ne = col.compare_scalar(&Scalar::Float64(0.0), ComparisonOp::Ne).expect("ne");
        assert_eq!(eq, vec![true, true, false]);
        assert_eq!(ne, vec![false, false, true]);
        assert_eq!(
            col.compare_scalar(&Scalar::Float64(-0.0), ComparisonOp::Lt).expect("lt"),
            vec![false, false, false]
        );
    }

    #[test]
    fn compare_places_nan_above_numbers() {
        let col = Column::from_f64s([Some(f64::NAN), Some(5.0)]);
        assert_eq!(
            col.compare_scalar(&Scalar::Float64(f64::INFINITY), ComparisonOp::Gt).expect("gt"),
            vec![true, false]
        );
        assert_eq!(
            col.compare_scalar(&Scalar::Float64(f64::NAN), ComparisonOp::Eq).expect("eq"),
            vec![true, false]
        );
    }

    #[test]
    fn compare_text_with_number_is_type_error() {
        let col = Column::from_strings([Some("a")]);
        let err = col
            .compare_scalar(&Scalar::Int64(1), ComparisonOp::Eq)
            .expect_err("incomparable");
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn operator_symbols_round_trip() {
        for symbol in ["==", "!=", "<", "<=", ">", ">="] {
            let op = ComparisonOp::from_symbol(symbol).expect("known symbol");
            assert_eq!(op.symbol(), symbol);
        }
        assert_eq!(ComparisonOp::from_symbol("=~"), None);
    }
}
