#![forbid(unsafe_code)]

use std::collections::HashMap;

use tf_columnar::{Column, ColumnData, ColumnError};
use tf_frame::{DataFrame, FrameError};
use tf_types::{ErrorKind, Scalar, ScalarKey, nanmean, nanmedian, nanstd, nanvar};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error("cannot group an empty frame")]
    EmptyFrame,
    #[error("at least one group key is required")]
    NoKeys,
    #[error("unknown aggregation '{0}'")]
    UnknownAggregation(String),
    #[error("aggregation '{0}' needs a value column")]
    MissingValueColumn(&'static str),
    #[error("integer sum of column '{0}' overflows")]
    SumOverflow(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

impl GroupByError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyFrame
            | Self::NoKeys
            | Self::UnknownAggregation(_)
            | Self::MissingValueColumn(_)
            | Self::SumOverflow(_) => ErrorKind::Value,
            Self::Frame(err) => err.kind(),
            Self::Column(err) => err.kind(),
        }
    }
}

/// Aggregation function selector for groupby operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggFunc {
    /// Rows in the group; output column `count`.
    Count,
    /// Rows in the group; output column `size`.
    Size,
    Sum,
    Mean,
    Min,
    Max,
    /// Sample standard deviation (n - 1).
    Std,
    /// Sample variance (n - 1).
    Var,
    Median,
    /// Raw value of the group's first row, null included.
    First,
    /// Raw value of the group's last row, null included.
    Last,
}

impl AggFunc {
    pub const ALL: [Self; 11] = [
        Self::Count,
        Self::Size,
        Self::Sum,
        Self::Mean,
        Self::Min,
        Self::Max,
        Self::Std,
        Self::Var,
        Self::Median,
        Self::First,
        Self::Last,
    ];

    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|func| func.name() == name)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Size => "size",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Min => "min",
            Self::Max => "max",
            Self::Std => "std",
            Self::Var => "var",
            Self::Median => "median",
            Self::First => "first",
            Self::Last => "last",
        }
    }

    /// Whether the aggregation reads a value column.
    #[must_use]
    pub fn needs_column(self) -> bool {
        !matches!(self, Self::Count | Self::Size)
    }
}

/// One partition: the key tuple and the source rows that carry it, in row order.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    key: Vec<Scalar>,
    rows: Vec<usize>,
}

impl Group {
    #[must_use]
    pub fn key(&self) -> &[Scalar] {
        &self.key
    }

    #[must_use]
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }
}

/// Partition of a frame's rows by key tuple, in first-seen group order.
///
/// The view borrows its frame, so the frame cannot be edited in place while the
/// view is alive. A null key value forms its own group.
#[derive(Debug, Clone)]
pub struct GroupBy<'a> {
    frame: &'a DataFrame,
    keys: Vec<String>,
    groups: Vec<Group>,
}

/// Shorthand for [`GroupBy::new`].
pub fn groupby<'a>(frame: &'a DataFrame, keys: &[&str]) -> Result<GroupBy<'a>, GroupByError> {
    GroupBy::new(frame, keys)
}

impl<'a> GroupBy<'a> {
    pub fn new(frame: &'a DataFrame, keys: &[&str]) -> Result<Self, GroupByError> {
        if keys.is_empty() {
            return Err(GroupByError::NoKeys);
        }
        let key_columns = keys
            .iter()
            .map(|name| frame.require(name))
            .collect::<Result<Vec<_>, _>>()?;
        if frame.is_empty() {
            return Err(GroupByError::EmptyFrame);
        }

        let mut slots = HashMap::<Vec<ScalarKey>, usize>::new();
        let mut groups: Vec<Group> = Vec::new();
        for row in 0..frame.len() {
            let key: Vec<Scalar> = key_columns.iter().map(|column| column.get(row)).collect();
            let identity: Vec<ScalarKey> = key.iter().map(ScalarKey::from).collect();
            match slots.get(&identity) {
                Some(&slot) => groups[slot].rows.push(row),
                None => {
                    slots.insert(identity, groups.len());
                    groups.push(Group {
                        key,
                        rows: vec![row],
                    });
                }
            }
        }

        Ok(Self {
            frame,
            keys: keys.iter().map(|name| (*name).to_owned()).collect(),
            groups,
        })
    }

    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    #[must_use]
    pub fn ngroups(&self) -> usize {
        self.groups.len()
    }

    /// Rows of the group whose key equals `key`.
    #[must_use]
    pub fn get_group(&self, key: &[Scalar]) -> Option<&[usize]> {
        let wanted: Vec<ScalarKey> = key.iter().map(ScalarKey::from).collect();
        self.groups
            .iter()
            .find(|group| group.key.iter().map(ScalarKey::from).eq(wanted.iter().cloned()))
            .map(Group::rows)
    }

    /// One row per group: the key columns, then the aggregate column
    /// (`<column>_<func>`, or `count`/`size`). A name taken by a key gets
    /// `_agg` appended until it is free.
    pub fn agg(&self, func: AggFunc, column: Option<&str>) -> Result<DataFrame, GroupByError> {
        let mut guard = tf_runtime::begin("groupby_agg");
        guard.rows(self.frame.len());

        let (name, result) = match column {
            _ if !func.needs_column() => (func.name().to_owned(), self.group_sizes()),
            Some(column) => {
                let source = self.frame.require(column)?;
                (
                    format!("{column}_{}", func.name()),
                    self.aggregate_column(func, column, source)?,
                )
            }
            None => return Err(GroupByError::MissingValueColumn(func.name())),
        };

        let mut name = name;
        while self.keys.contains(&name) {
            name.push_str("_agg");
        }

        let first_rows: Vec<usize> = self.groups.iter().map(|group| group.rows[0]).collect();
        let mut pairs = Vec::with_capacity(self.keys.len() + 1);
        for key in &self.keys {
            pairs.push((key.clone(), self.frame.require(key)?.take(&first_rows)));
        }
        pairs.push((name, result));

        let out = DataFrame::from_columns(pairs)?;
        guard.bytes(out.estimated_bytes());
        Ok(out)
    }

    /// [`GroupBy::agg`] with the aggregation given by name.
    pub fn agg_named(&self, func: &str, column: Option<&str>) -> Result<DataFrame, GroupByError> {
        let parsed =
            AggFunc::parse(func).ok_or_else(|| GroupByError::UnknownAggregation(func.to_owned()))?;
        self.agg(parsed, column)
    }

    pub fn count(&self) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Count, None)
    }

    pub fn size(&self) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Size, None)
    }

    pub fn sum(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Sum, Some(column))
    }

    pub fn mean(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Mean, Some(column))
    }

    pub fn min(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Min, Some(column))
    }

    pub fn max(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Max, Some(column))
    }

    pub fn std(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Std, Some(column))
    }

    pub fn var(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Var, Some(column))
    }

    pub fn median(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Median, Some(column))
    }

    pub fn first(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::First, Some(column))
    }

    pub fn last(&self, column: &str) -> Result<DataFrame, GroupByError> {
        self.agg(AggFunc::Last, Some(column))
    }

    fn group_sizes(&self) -> Column {
        Column::from_i64s(self.groups.iter().map(|group| Some(group.rows.len() as i64)))
    }

    fn aggregate_column(
        &self,
        func: AggFunc,
        name: &str,
        source: &Column,
    ) -> Result<Column, GroupByError> {
        match func {
            AggFunc::First => {
                let rows: Vec<usize> = self.groups.iter().map(|group| group.rows[0]).collect();
                return Ok(source.take(&rows));
            }
            AggFunc::Last => {
                let rows: Vec<usize> = self
                    .groups
                    .iter()
                    .map(|group| group.rows[group.rows.len() - 1])
                    .collect();
                return Ok(source.take(&rows));
            }
            _ => {}
        }

        self.frame.require_numeric(name, "group aggregation")?;
        if let ColumnData::Int64(data) = source.data()
            && matches!(func, AggFunc::Sum | AggFunc::Min | AggFunc::Max)
        {
            let cells = self
                .groups
                .iter()
                .map(|group| {
                    let mut present = group
                        .rows
                        .iter()
                        .filter(|row| source.is_valid(**row))
                        .map(|row| data[*row]);
                    match func {
                        AggFunc::Sum => present
                            .try_fold(0_i64, i64::checked_add)
                            .map(Some)
                            .ok_or_else(|| GroupByError::SumOverflow(name.to_owned())),
                        AggFunc::Min => Ok(present.min()),
                        _ => Ok(present.max()),
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Column::from_i64s(cells));
        }

        let values = source.to_f64_options("group aggregation")?;
        Ok(Column::from_f64s(self.groups.iter().map(|group| {
            let present: Vec<f64> = group.rows.iter().filter_map(|row| values[*row]).collect();
            match func {
                AggFunc::Sum => Some(present.iter().sum()),
                AggFunc::Mean => nanmean(&present),
                AggFunc::Min => present.iter().copied().reduce(f64::min),
                AggFunc::Max => present.iter().copied().reduce(f64::max),
                AggFunc::Std => nanstd(&present, 1),
                AggFunc::Var => nanvar(&present, 1),
                AggFunc::Median => nanmedian(&present),
                AggFunc::Count | AggFunc::Size | AggFunc::First | AggFunc::Last => None,
            }
        })))
    }
}
