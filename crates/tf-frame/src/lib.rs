#![forbid(unsafe_code)]

mod derive;
mod validate;
mod window;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tf_columnar::{Column, ColumnError, ComparisonOp};
use tf_types::{DType, ErrorKind, Scalar, TypeError};
use thiserror::Error;

pub use validate::ValidationSummary;
pub use window::{RankMethod, WindowAgg};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("column '{0}' not found")]
    ColumnNotFound(String),
    #[error("column '{0}' already exists")]
    DuplicateColumn(String),
    #[error("column '{name}' has {actual} rows but the frame has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{op} not supported on column '{column}' of dtype {dtype}")]
    UnsupportedDtype {
        op: &'static str,
        column: String,
        dtype: DType,
    },
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl FrameError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ColumnNotFound(_) => ErrorKind::Lookup,
            Self::DuplicateColumn(_) | Self::LengthMismatch { .. } | Self::InvalidArgument(_) => {
                ErrorKind::Value
            }
            Self::UnsupportedDtype { .. } | Self::Type(_) => ErrorKind::Type,
            Self::Column(err) => err.kind(),
        }
    }
}

/// One row: an ordered field-name to value mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a field, replacing an existing value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

fn json_to_scalar(value: &serde_json::Value) -> Scalar {
    use serde_json::Value;
    match value {
        Value::Null => Scalar::Null,
        Value::Bool(v) => Scalar::Bool(*v),
        Value::Number(n) => n
            .as_i64()
            .map(Scalar::Int64)
            .or_else(|| n.as_f64().map(Scalar::Float64))
            .unwrap_or(Scalar::Null),
        Value::String(s) => Scalar::Utf8(s.clone()),
        // Sequences and nested objects are kept as their JSON text.
        Value::Array(_) | Value::Object(_) => Scalar::Utf8(value.to_string()),
    }
}

fn scalar_to_json(value: &Scalar) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Scalar::Null => Value::Null,
        Scalar::Bool(v) => Value::Bool(*v),
        Scalar::Int64(v) => Value::from(*v),
        Scalar::Float64(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Scalar::Utf8(v) => Value::String(v.clone()),
    }
}

/// Missing values sort after every present value regardless of direction.
pub(crate) fn compare_scalars_with_nulls_last(
    left: &Scalar,
    right: &Scalar,
    ascending: bool,
) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let order = left.partial_cmp_value(right).unwrap_or(Ordering::Equal);
            if ascending { order } else { order.reverse() }
        }
    }
}

/// Ordered collection of equally long, uniquely named columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FrameParts")]
pub struct DataFrame {
    row_count: usize,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

/// Unchecked wire form of [`DataFrame`].
#[derive(Deserialize)]
struct FrameParts {
    row_count: usize,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

impl TryFrom<FrameParts> for DataFrame {
    type Error = FrameError;

    fn try_from(mut parts: FrameParts) -> Result<Self, Self::Error> {
        let mut pairs: Vec<(String, Column)> = Vec::with_capacity(parts.column_order.len());
        for name in parts.column_order {
            let column = parts.columns.remove(&name).ok_or_else(|| {
                if pairs.iter().any(|(seen, _)| *seen == name) {
                    FrameError::DuplicateColumn(name.clone())
                } else {
                    FrameError::ColumnNotFound(name.clone())
                }
            })?;
            pairs.push((name, column));
        }
        if let Some(unordered) = parts.columns.into_keys().next() {
            return Err(FrameError::InvalidArgument(format!(
                "column '{unordered}' is missing from the column order"
            )));
        }
        Self::assemble(parts.row_count, pairs)
    }
}

impl DataFrame {
    fn assemble(row_count: usize, pairs: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let mut columns = BTreeMap::new();
        let mut column_order = Vec::with_capacity(pairs.len());
        for (name, column) in pairs {
            if column.len() != row_count {
                return Err(FrameError::LengthMismatch {
                    name,
                    expected: row_count,
                    actual: column.len(),
                });
            }
            if columns.contains_key(&name) {
                return Err(FrameError::DuplicateColumn(name));
            }
            column_order.push(name.clone());
            columns.insert(name, column);
        }
        Ok(Self {
            row_count,
            columns,
            column_order,
        })
    }

    /// Frame from named columns in the given order. Names must be unique and lengths equal.
    pub fn from_columns(pairs: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let row_count = pairs.first().map_or(0, |(_, column)| column.len());
        Self::assemble(row_count, pairs)
    }

    /// Build a frame from row records, inferring one column kind per field.
    ///
    /// Columns appear in first-seen key order across all records. A field missing
    /// from a record is null for that row; a field null everywhere becomes a
    /// nullable text column.
    pub fn from_records(records: &[Record]) -> Result<Self, FrameError> {
        if records.is_empty() {
            return Err(FrameError::InvalidArgument(
                "cannot build a frame from an empty record list".to_owned(),
            ));
        }
        let mut guard = tf_runtime::begin("from_records");
        guard.rows(records.len());

        let mut names = Vec::new();
        let mut seen = BTreeSet::new();
        for record in records {
            for (name, _) in record.iter() {
                if seen.insert(name) {
                    names.push(name.to_owned());
                }
            }
        }

        let mut pairs = Vec::with_capacity(names.len());
        for name in names {
            let values: Vec<Scalar> = records
                .iter()
                .map(|record| record.get(&name).cloned().unwrap_or(Scalar::Null))
                .collect();
            let column = Column::from_values(&values)?;
            pairs.push((name, column));
        }

        let frame = Self::assemble(records.len(), pairs)?;
        guard.bytes(frame.estimated_bytes());
        tf_runtime::log_operation(
            "from_records",
            &format!("built {}x{} frame", frame.len(), frame.num_columns()),
            None,
        );
        Ok(frame)
    }

    /// Build a frame from JSON objects. Arrays and nested objects become text.
    pub fn from_json_records(records: &[serde_json::Value]) -> Result<Self, FrameError> {
        let records = records
            .iter()
            .enumerate()
            .map(|(row, value)| {
                let object = value.as_object().ok_or_else(|| {
                    FrameError::InvalidArgument(format!("record {row} is not a JSON object"))
                })?;
                Ok(object
                    .iter()
                    .map(|(name, value)| (name.clone(), json_to_scalar(value)))
                    .collect::<Record>())
            })
            .collect::<Result<Vec<_>, FrameError>>()?;
        Self::from_records(&records)
    }

    // ── Shape & access ─────────────────────────────────────────────────

    #[must_use]
    pub fn len(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.column_order.len()
    }

    /// `(rows, columns)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.column_order.len())
    }

    /// Column names in frame order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    #[must_use]
    pub fn contains_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Lookup that fails with [`FrameError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .get(name)
            .ok_or_else(|| FrameError::ColumnNotFound(name.to_owned()))
    }

    /// `(name, column)` pairs in frame order.
    pub fn iter_columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.column_order
            .iter()
            .filter_map(|name| self.columns.get(name).map(|col| (name.as_str(), col)))
    }

    #[must_use]
    pub fn dtypes(&self) -> Vec<(&str, DType)> {
        self.iter_columns()
            .map(|(name, column)| (name, column.dtype()))
            .collect()
    }

    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        self.columns.values().map(Column::estimated_bytes).sum()
    }

    #[must_use]
    pub fn row(&self, idx: usize) -> Option<Record> {
        (idx < self.row_count).then(|| {
            self.iter_columns()
                .map(|(name, column)| (name, column.get(idx)))
                .collect()
        })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.row_count).filter_map(|idx| self.row(idx))
    }

    #[must_use]
    pub fn to_records(&self) -> Vec<Record> {
        self.iter_rows().collect()
    }

    #[must_use]
    pub fn to_json_records(&self) -> Vec<serde_json::Value> {
        self.iter_rows()
            .map(|record| {
                let object = record
                    .iter()
                    .map(|(name, value)| (name.to_owned(), scalar_to_json(value)))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect()
    }

    // ── Derived frames ─────────────────────────────────────────────────

    /// Copy of the frame with `column` appended, or replacing a same-named column in place.
    pub fn with_column(&self, name: impl Into<String>, column: Column) -> Result<Self, FrameError> {
        let name = name.into();
        if column.len() != self.row_count && !self.column_order.is_empty() {
            return Err(FrameError::LengthMismatch {
                name,
                expected: self.row_count,
                actual: column.len(),
            });
        }
        let mut out = self.clone();
        out.row_count = column.len();
        if !out.columns.contains_key(&name) {
            out.column_order.push(name.clone());
        }
        out.columns.insert(name, column);
        Ok(out)
    }

    /// Rows at `positions`, in that order.
    #[must_use]
    pub fn take_rows(&self, positions: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, column)| (name.clone(), column.take(positions)))
            .collect();
        Self {
            row_count: positions.len(),
            columns,
            column_order: self.column_order.clone(),
        }
    }

    /// Rows where `mask` is true.
    pub fn filter_mask(&self, mask: &[bool]) -> Result<Self, FrameError> {
        if mask.len() != self.row_count {
            return Err(FrameError::InvalidArgument(format!(
                "mask has {} entries for {} rows",
                mask.len(),
                self.row_count
            )));
        }
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        Ok(self.take_rows(&positions))
    }

    /// Rows where `column <op> value` holds. `op` is one of `== != < <= > >=`.
    ///
    /// Comparing with `Scalar::Null` under `==`/`!=` selects or excludes missing values.
    pub fn filter(&self, column: &str, op: &str, value: &Scalar) -> Result<Self, FrameError> {
        let source = self.require(column)?;
        let op = ComparisonOp::from_symbol(op)
            .ok_or_else(|| FrameError::InvalidArgument(format!("unknown operator '{op}'")))?;
        let mut guard = tf_runtime::begin("filter");
        guard.rows(self.row_count);

        let mask = source.compare_scalar(value, op)?;
        self.filter_mask(&mask)
    }

    /// Stable multi-key sort. Nulls go last in either direction.
    pub fn sort_values(&self, columns: &[&str], ascending: bool) -> Result<Self, FrameError> {
        if columns.is_empty() {
            if self.column_order.is_empty() {
                return Ok(self.clone());
            }
            return Err(FrameError::InvalidArgument(
                "sort_values needs at least one column".to_owned(),
            ));
        }
        let keys = columns
            .iter()
            .map(|name| self.require(name).map(Column::to_values))
            .collect::<Result<Vec<_>, _>>()?;
        let mut guard = tf_runtime::begin("sort_values");
        guard.rows(self.row_count);

        let mut order: Vec<usize> = (0..self.row_count).collect();
        order.sort_by(|&left, &right| {
            keys.iter()
                .map(|values| {
                    compare_scalars_with_nulls_last(&values[left], &values[right], ascending)
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        Ok(self.take_rows(&order))
    }

    /// Drop rows holding a null in any of `subset` (every column when `None`).
    pub fn dropna(&self, subset: Option<&[&str]>) -> Result<Self, FrameError> {
        let selected: Vec<&Column> = match subset {
            Some(names) => names
                .iter()
                .map(|name| self.require(name))
                .collect::<Result<_, _>>()?,
            None => self.columns.values().collect(),
        };
        let mask: Vec<bool> = (0..self.row_count)
            .map(|row| selected.iter().all(|column| column.is_valid(row)))
            .collect();
        self.filter_mask(&mask)
    }

    // ── In-place schema edits ──────────────────────────────────────────

    /// Fill nulls per column. Every target is validated before any column changes.
    pub fn fillna(&mut self, fills: &[(&str, Scalar)]) -> Result<(), FrameError> {
        let mut replacements = Vec::with_capacity(fills.len());
        for (name, value) in fills {
            let filled = self.require(name)?.fill_null(value)?;
            replacements.push(((*name).to_owned(), filled));
        }
        for (name, column) in replacements {
            self.columns.insert(name, column);
        }
        Ok(())
    }

    /// Fill nulls in every column whose kind accepts `value`; other columns are left alone.
    pub fn fillna_all(&mut self, value: &Scalar) {
        for (name, column) in &mut self.columns {
            if column.fill_dtype(value).is_none() {
                tracing::debug!(column = %name, dtype = %column.dtype(), "fillna_all skipped column");
                continue;
            }
            if let Ok(filled) = column.fill_null(value) {
                *column = filled;
            }
        }
    }

    pub fn cast_column(&mut self, name: &str, dtype: DType) -> Result<(), FrameError> {
        if dtype == DType::Null {
            return Err(FrameError::InvalidArgument(
                "cannot cast a column to the null dtype".to_owned(),
            ));
        }
        let cast = self.require(name)?.cast(dtype)?;
        self.columns.insert(name.to_owned(), cast);
        Ok(())
    }

    /// Replace every non-null value of `name` with `func(value)`; nulls are untouched.
    pub fn edit_column<F>(&mut self, name: &str, func: F) -> Result<(), FrameError>
    where
        F: FnMut(&Scalar) -> Scalar,
    {
        let edited = self.require(name)?.map_valid(func)?;
        self.columns.insert(name.to_owned(), edited);
        Ok(())
    }

    pub fn drop_columns(&mut self, names: &[&str]) -> Result<(), FrameError> {
        if let Some(missing) = names.iter().find(|name| !self.columns.contains_key(**name)) {
            return Err(FrameError::ColumnNotFound((*missing).to_owned()));
        }
        for name in names {
            self.columns.remove(*name);
        }
        self.column_order
            .retain(|name| !names.contains(&name.as_str()));
        if self.column_order.is_empty() {
            self.row_count = 0;
        }
        Ok(())
    }

    /// Rename `old` to `new`, keeping its position.
    pub fn rename_column(&mut self, old: &str, new: &str) -> Result<(), FrameError> {
        if !self.columns.contains_key(old) {
            return Err(FrameError::ColumnNotFound(old.to_owned()));
        }
        if old == new {
            return Ok(());
        }
        if self.columns.contains_key(new) {
            return Err(FrameError::DuplicateColumn(new.to_owned()));
        }
        if let Some(column) = self.columns.remove(old) {
            self.columns.insert(new.to_owned(), column);
        }
        for name in &mut self.column_order {
            if name == old {
                new.clone_into(name);
            }
        }
        Ok(())
    }

    /// Column of a numeric kind, or a type error naming `op`.
    pub fn require_numeric(&self, name: &str, op: &'static str) -> Result<&Column, FrameError> {
        let column = self.require(name)?;
        if !column.dtype().is_numeric() {
            return Err(FrameError::UnsupportedDtype {
                op,
                column: name.to_owned(),
                dtype: column.dtype(),
            });
        }
        Ok(column)
    }
}
