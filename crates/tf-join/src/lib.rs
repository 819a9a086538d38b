#![forbid(unsafe_code)]

use std::{collections::HashMap, mem::size_of};

use bumpalo::{Bump, collections::Vec as BumpVec};
use tf_columnar::{Column, ColumnError};
use tf_frame::{DataFrame, FrameError};
use tf_types::{ErrorKind, Scalar, ScalarKey};
use thiserror::Error;

/// Suffix appended to a right-hand column whose name is already taken.
pub const RIGHT_SUFFIX: &str = "_right";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
    Cross,
}

impl JoinType {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "inner" => Some(Self::Inner),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "outer" => Some(Self::Outer),
            "cross" => Some(Self::Cross),
            _ => None,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Inner => "inner",
            Self::Left => "left",
            Self::Right => "right",
            Self::Outer => "outer",
            Self::Cross => "cross",
        }
    }
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("left_on has {left} columns but right_on has {right}")]
    KeyCountMismatch { left: usize, right: usize },
    #[error("{0} join needs at least one key column")]
    MissingKeys(&'static str),
    #[error("cross join takes no key columns")]
    CrossWithKeys,
    #[error("unknown join type '{0}'")]
    UnknownJoinType(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

impl JoinError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::KeyCountMismatch { .. }
            | Self::MissingKeys(_)
            | Self::CrossWithKeys
            | Self::UnknownJoinType(_) => ErrorKind::Value,
            Self::Frame(err) => err.kind(),
            Self::Column(err) => err.kind(),
        }
    }
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for JoinExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct JoinExecutionTrace {
    used_arena: bool,
    output_rows: usize,
    estimated_bytes: usize,
}

/// Equality join of `left` and `right` on paired key columns.
///
/// Left columns come first, then right columns. A right key that shares its
/// name and kind with the paired left key is merged into the left key column;
/// any other right column whose name is taken gets [`RIGHT_SUFFIX`]. Null keys
/// never match.
pub fn join(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinType,
) -> Result<DataFrame, JoinError> {
    join_with_options(
        left,
        right,
        left_on,
        right_on,
        how,
        JoinExecutionOptions::default(),
    )
}

/// [`join`] with the join type given by name.
pub fn join_named(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: &str,
) -> Result<DataFrame, JoinError> {
    let how = JoinType::parse(how).ok_or_else(|| JoinError::UnknownJoinType(how.to_owned()))?;
    join(left, right, left_on, right_on, how)
}

/// Every left row paired with every right row, left-major.
pub fn cross_join(left: &DataFrame, right: &DataFrame) -> Result<DataFrame, JoinError> {
    join(left, right, &[], &[], JoinType::Cross)
}

pub fn join_with_options(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinType,
    options: JoinExecutionOptions,
) -> Result<DataFrame, JoinError> {
    match join_with_trace(left, right, left_on, right_on, how, options) {
        Ok((joined, _)) => Ok(joined),
        Err(err) => {
            tf_runtime::log_error("join", &err.to_string(), Some(how.name()));
            Err(err)
        }
    }
}

fn validate_keys(left_on: &[&str], right_on: &[&str], how: JoinType) -> Result<(), JoinError> {
    if how == JoinType::Cross {
        if !left_on.is_empty() || !right_on.is_empty() {
            return Err(JoinError::CrossWithKeys);
        }
        return Ok(());
    }
    if left_on.len() != right_on.len() {
        return Err(JoinError::KeyCountMismatch {
            left: left_on.len(),
            right: right_on.len(),
        });
    }
    if left_on.is_empty() {
        return Err(JoinError::MissingKeys(how.name()));
    }
    Ok(())
}

/// Composite key per row; `None` when any part is null.
fn row_keys(frame: &DataFrame, on: &[&str]) -> Result<Vec<Option<Vec<ScalarKey>>>, JoinError> {
    let columns = on
        .iter()
        .map(|name| frame.require(name))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((0..frame.len())
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    let key = ScalarKey::from(&column.get(row));
                    (!key.is_null()).then_some(key)
                })
                .collect()
        })
        .collect())
}

fn build_index(keys: &[Option<Vec<ScalarKey>>]) -> HashMap<&[ScalarKey], Vec<usize>> {
    let mut index = HashMap::<&[ScalarKey], Vec<usize>>::new();
    for (pos, key) in keys.iter().enumerate() {
        if let Some(key) = key {
            index.entry(key.as_slice()).or_default().push(pos);
        }
    }
    index
}

/// Probe side, build side, and whether unmatched probe rows are kept.
struct JoinPlan<'k> {
    probe: &'k [Option<Vec<ScalarKey>>],
    build: HashMap<&'k [ScalarKey], Vec<usize>>,
    build_rows: usize,
    keep_unmatched_probe: bool,
    keep_unmatched_build: bool,
    probe_is_left: bool,
}

impl JoinPlan<'_> {
    fn matches(&self, probe_row: usize) -> Option<&Vec<usize>> {
        self.probe[probe_row]
            .as_deref()
            .and_then(|key| self.build.get(key))
    }

    fn estimate_output_rows(&self) -> usize {
        let probed: usize = (0..self.probe.len())
            .map(|row| match self.matches(row) {
                Some(found) => found.len(),
                None if self.keep_unmatched_probe => 1,
                None => 0,
            })
            .sum();
        if self.keep_unmatched_build {
            probed.saturating_add(self.build_rows)
        } else {
            probed
        }
    }
}

/// Destination for `(left, right)` row position pairs.
trait PositionSink {
    fn push_pair(&mut self, left: Option<usize>, right: Option<usize>);
}

impl PositionSink for (Vec<Option<usize>>, Vec<Option<usize>>) {
    fn push_pair(&mut self, left: Option<usize>, right: Option<usize>) {
        self.0.push(left);
        self.1.push(right);
    }
}

impl PositionSink for (BumpVec<'_, Option<usize>>, BumpVec<'_, Option<usize>>) {
    fn push_pair(&mut self, left: Option<usize>, right: Option<usize>) {
        self.0.push(left);
        self.1.push(right);
    }
}

fn fill_positions(plan: &JoinPlan<'_>, sink: &mut impl PositionSink) {
    let mut oriented = |probe: Option<usize>, build: Option<usize>| {
        if plan.probe_is_left {
            sink.push_pair(probe, build);
        } else {
            sink.push_pair(build, probe);
        }
    };

    let mut build_matched = vec![false; plan.build_rows];
    for probe_row in 0..plan.probe.len() {
        match plan.matches(probe_row) {
            Some(found) => {
                for &build_row in found {
                    build_matched[build_row] = true;
                    oriented(Some(probe_row), Some(build_row));
                }
            }
            None if plan.keep_unmatched_probe => oriented(Some(probe_row), None),
            None => {}
        }
    }
    if plan.keep_unmatched_build {
        for (build_row, matched) in build_matched.iter().enumerate() {
            if !matched {
                oriented(None, Some(build_row));
            }
        }
    }
}

fn cross_positions(left_rows: usize, right_rows: usize, sink: &mut impl PositionSink) {
    for left_row in 0..left_rows {
        for right_row in 0..right_rows {
            sink.push_pair(Some(left_row), Some(right_row));
        }
    }
}

fn estimate_intermediate_bytes(output_rows: usize) -> usize {
    output_rows.saturating_mul(size_of::<Option<usize>>().saturating_mul(2))
}

fn join_with_trace(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    how: JoinType,
    options: JoinExecutionOptions,
) -> Result<(DataFrame, JoinExecutionTrace), JoinError> {
    validate_keys(left_on, right_on, how)?;
    let left_keys = row_keys(left, left_on)?;
    let right_keys = row_keys(right, right_on)?;

    let plan = match how {
        JoinType::Cross => None,
        JoinType::Right => Some(JoinPlan {
            probe: &right_keys,
            build: build_index(&left_keys),
            build_rows: left.len(),
            keep_unmatched_probe: true,
            keep_unmatched_build: false,
            probe_is_left: false,
        }),
        JoinType::Inner | JoinType::Left | JoinType::Outer => Some(JoinPlan {
            probe: &left_keys,
            build: build_index(&right_keys),
            build_rows: right.len(),
            keep_unmatched_probe: how != JoinType::Inner,
            keep_unmatched_build: how == JoinType::Outer,
            probe_is_left: true,
        }),
    };

    let output_rows = plan.as_ref().map_or_else(
        || left.len().saturating_mul(right.len()),
        JoinPlan::estimate_output_rows,
    );
    let estimated_bytes = estimate_intermediate_bytes(output_rows);
    let use_arena = options.use_arena && estimated_bytes <= options.arena_budget_bytes;

    let mut guard = tf_runtime::begin("join");
    guard.bytes(estimated_bytes);

    let joined = if use_arena {
        let arena = Bump::new();
        let mut sink = (
            BumpVec::<Option<usize>>::with_capacity_in(output_rows, &arena),
            BumpVec::<Option<usize>>::with_capacity_in(output_rows, &arena),
        );
        match &plan {
            Some(plan) => fill_positions(plan, &mut sink),
            None => cross_positions(left.len(), right.len(), &mut sink),
        }
        assemble(left, right, left_on, right_on, &sink.0, &sink.1)?
    } else {
        let mut sink = (
            Vec::<Option<usize>>::with_capacity(output_rows),
            Vec::<Option<usize>>::with_capacity(output_rows),
        );
        match &plan {
            Some(plan) => fill_positions(plan, &mut sink),
            None => cross_positions(left.len(), right.len(), &mut sink),
        }
        assemble(left, right, left_on, right_on, &sink.0, &sink.1)?
    };

    guard.rows(joined.len());
    tf_runtime::log_operation(
        "join",
        &format!(
            "{} join produced {} rows from {}x{}",
            how.name(),
            joined.len(),
            left.len(),
            right.len()
        ),
        None,
    );

    Ok((
        joined,
        JoinExecutionTrace {
            used_arena: use_arena,
            output_rows,
            estimated_bytes,
        },
    ))
}

/// Left key value where the left side is present, right key value otherwise.
fn coalesce_key(
    left_key: &Column,
    right_key: &Column,
    left_positions: &[Option<usize>],
    right_positions: &[Option<usize>],
) -> Result<Column, JoinError> {
    let merged: Vec<Scalar> = left_positions
        .iter()
        .zip(right_positions)
        .map(|(l, r)| match (l, r) {
            (Some(l), _) => left_key.get(*l),
            (None, Some(r)) => right_key.get(*r),
            (None, None) => Scalar::Null,
        })
        .collect();
    Ok(Column::from_values_as(&merged, left_key.dtype())?)
}

fn assemble(
    left: &DataFrame,
    right: &DataFrame,
    left_on: &[&str],
    right_on: &[&str],
    left_positions: &[Option<usize>],
    right_positions: &[Option<usize>],
) -> Result<DataFrame, JoinError> {
    // Right keys folded into their same-named, same-kind left key.
    let mut merged_right = Vec::new();
    let mut pairs = Vec::with_capacity(left.num_columns() + right.num_columns());
    for (name, column) in left.iter_columns() {
        let paired = left_on
            .iter()
            .zip(right_on)
            .find(|(l, r)| **l == name && **r == name)
            .and_then(|_| right.column(name))
            .filter(|right_key| right_key.dtype() == column.dtype());
        let out = match paired {
            Some(right_key) => {
                merged_right.push(name);
                coalesce_key(column, right_key, left_positions, right_positions)?
            }
            None => column.take_optional(left_positions),
        };
        pairs.push((name.to_owned(), out));
    }

    for (name, column) in right.iter_columns() {
        if merged_right.contains(&name) {
            continue;
        }
        let mut out_name = name.to_owned();
        while pairs.iter().any(|(taken, _)| *taken == out_name) {
            out_name.push_str(RIGHT_SUFFIX);
        }
        pairs.push((out_name, column.take_optional(right_positions)));
    }

    Ok(DataFrame::from_columns(pairs)?)
}
