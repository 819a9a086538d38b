use serde::{Deserialize, Serialize};
use tf_columnar::Column;
use tf_types::{nanmean, nansum, nanstd};

use crate::{DataFrame, FrameError};

/// Aggregation applied over a rolling or expanding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAgg {
    Mean,
    Sum,
    /// Population standard deviation.
    Std,
}

impl WindowAgg {
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Std => "std",
        }
    }

    fn compute(self, values: &[f64]) -> Option<f64> {
        match self {
            Self::Mean => nanmean(values),
            Self::Sum => Some(nansum(values)),
            Self::Std => nanstd(values, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMethod {
    /// Mean of the positions a tie group spans.
    Average,
    Min,
    Max,
    /// Ties ranked by row order.
    First,
    /// Consecutive ranks per distinct value.
    Dense,
}

impl RankMethod {
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "average" => Some(Self::Average),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "first" => Some(Self::First),
            "dense" => Some(Self::Dense),
            _ => None,
        }
    }
}

/// Running count/mean/M2 accumulator (Welford).
#[derive(Default)]
struct Running {
    count: usize,
    sum: f64,
    mean: f64,
    m2: f64,
}

impl Running {
    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn value(&self, agg: WindowAgg) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(match agg {
            WindowAgg::Mean => self.mean,
            WindowAgg::Sum => self.sum,
            WindowAgg::Std => (self.m2 / self.count as f64).sqrt(),
        })
    }
}

impl DataFrame {
    /// Append `<column>_rolling_<agg>`. A row is null until a full window of
    /// non-null values ends at it.
    pub fn rolling(&self, column: &str, window: usize, agg: WindowAgg) -> Result<Self, FrameError> {
        let values = self
            .require_numeric(column, "rolling operations")?
            .to_f64_options("rolling operations")?;
        if window == 0 {
            return Err(FrameError::InvalidArgument(
                "rolling window must be at least 1".to_owned(),
            ));
        }
        let mut guard = tf_runtime::begin("rolling");
        guard.rows(values.len());

        let out = (0..values.len()).map(|end| {
            let start = (end + 1).checked_sub(window)?;
            let full: Option<Vec<f64>> = values[start..=end].iter().copied().collect();
            full.and_then(|window_values| agg.compute(&window_values))
        });
        self.with_column(
            format!("{column}_rolling_{}", agg.suffix()),
            Column::from_f64s(out),
        )
    }

    pub fn rolling_mean(&self, column: &str, window: usize) -> Result<Self, FrameError> {
        self.rolling(column, window, WindowAgg::Mean)
    }

    pub fn rolling_sum(&self, column: &str, window: usize) -> Result<Self, FrameError> {
        self.rolling(column, window, WindowAgg::Sum)
    }

    pub fn rolling_std(&self, column: &str, window: usize) -> Result<Self, FrameError> {
        self.rolling(column, window, WindowAgg::Std)
    }

    /// Append `<column>_expanding_<agg>` over every non-null value seen so far.
    pub fn expanding(&self, column: &str, agg: WindowAgg) -> Result<Self, FrameError> {
        let values = self
            .require_numeric(column, "expanding operations")?
            .to_f64_options("expanding operations")?;
        let mut guard = tf_runtime::begin("expanding");
        guard.rows(values.len());

        let mut running = Running::default();
        let out: Vec<Option<f64>> = values
            .iter()
            .map(|value| {
                if let Some(v) = value {
                    running.push(*v);
                }
                running.value(agg)
            })
            .collect();
        self.with_column(
            format!("{column}_expanding_{}", agg.suffix()),
            Column::from_f64s(out),
        )
    }

    pub fn expanding_mean(&self, column: &str) -> Result<Self, FrameError> {
        self.expanding(column, WindowAgg::Mean)
    }

    pub fn expanding_sum(&self, column: &str) -> Result<Self, FrameError> {
        self.expanding(column, WindowAgg::Sum)
    }

    pub fn expanding_std(&self, column: &str) -> Result<Self, FrameError> {
        self.expanding(column, WindowAgg::Std)
    }

    /// Append `<column>_rank`; `method` is one of `average`, `min`, `max`, `first`, `dense`.
    pub fn rank(&self, column: &str, method: &str) -> Result<Self, FrameError> {
        let method = RankMethod::parse(method)
            .ok_or_else(|| FrameError::InvalidArgument(format!("unknown rank method '{method}'")))?;
        self.rank_with(column, method)
    }

    /// Ascending 1-based ranks as floats. Nulls stay null; ties use exact equality.
    pub fn rank_with(&self, column: &str, method: RankMethod) -> Result<Self, FrameError> {
        let values = self
            .require_numeric(column, "rank")?
            .to_f64_options("rank")?;
        let mut guard = tf_runtime::begin("rank");
        guard.rows(values.len());

        let mut order: Vec<(usize, f64)> = values
            .iter()
            .enumerate()
            .filter_map(|(row, value)| value.map(|v| (row, v)))
            .collect();
        // Stable: equal values keep row order, which `first` relies on.
        order.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut ranks = vec![None; values.len()];
        let mut start = 0;
        let mut dense = 0.0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && order[end].1 == order[start].1 {
                end += 1;
            }
            dense += 1.0;
            for (offset, &(row, _)) in order[start..end].iter().enumerate() {
                let rank = match method {
                    RankMethod::Average => (start + 1 + end) as f64 / 2.0,
                    RankMethod::Min => (start + 1) as f64,
                    RankMethod::Max => end as f64,
                    RankMethod::First => (start + offset + 1) as f64,
                    RankMethod::Dense => dense,
                };
                ranks[row] = Some(rank);
            }
            start = end;
        }
        self.with_column(format!("{column}_rank"), Column::from_f64s(ranks))
    }

    /// Append `<column>_pct_change`: `(current - previous) / previous * 100`.
    ///
    /// The first row, rows next to a null, and rows after a zero are null.
    pub fn pct_change(&self, column: &str) -> Result<Self, FrameError> {
        let values = self
            .require_numeric(column, "pct_change")?
            .to_f64_options("pct_change")?;
        let out = values.iter().enumerate().map(|(row, current)| {
            let previous = values.get(row.checked_sub(1)?).copied().flatten()?;
            let current = (*current)?;
            (previous != 0.0).then(|| (current - previous) / previous * 100.0)
        });
        self.with_column(format!("{column}_pct_change"), Column::from_f64s(out))
    }
}

#[cfg(test)]
mod tests {
    use tf_types::{ErrorKind, Scalar};

    use crate::{DataFrame, Record};

    fn series(values: &[Option<f64>]) -> DataFrame {
        let records: Vec<Record> = values
            .iter()
            .map(|v| Record::new().with("x", *v))
            .collect();
        DataFrame::from_records(&records).expect("frame")
    }

    fn floats(frame: &DataFrame, name: &str) -> Vec<Option<f64>> {
        frame
            .require(name)
            .expect("column")
            .to_f64_options("test")
            .expect("numeric")
    }

    fn assert_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "{a} != {e}"),
                (None, None) => {}
                _ => panic!("{actual:?} != {expected:?}"),
            }
        }
    }

    // ── Rolling ──

    #[test]
    fn rolling_mean_fills_after_window() {
        let frame = series(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)]);
        let out = frame.rolling_mean("x", 3).expect("rolling");
        assert_eq!(out.columns(), ["x", "x_rolling_mean"]);
        assert_close(
            &floats(&out, "x_rolling_mean"),
            &[None, None, Some(2.0), Some(3.0), Some(4.0)],
        );
    }

    #[test]
    fn rolling_window_with_null_is_null() {
        let frame = series(&[Some(1.0), None, Some(3.0), Some(4.0)]);
        let out = frame.rolling_sum("x", 2).expect("rolling");
        assert_close(&floats(&out, "x_rolling_sum"), &[None, None, None, Some(7.0)]);
    }

    #[test]
    fn rolling_std_is_population_and_window_one_is_identity() {
        let frame = series(&[Some(2.0), Some(4.0), Some(4.0)]);
        let std = frame.rolling_std("x", 2).expect("std");
        assert_close(&floats(&std, "x_rolling_std"), &[None, Some(1.0), Some(0.0)]);

        let identity = frame.rolling_mean("x", 1).expect("mean");
        assert_close(&floats(&identity, "x_rolling_mean"), &floats(&frame, "x"));
    }

    #[test]
    fn rolling_rejects_zero_window_and_text() {
        let frame = series(&[Some(1.0)]);
        assert_eq!(frame.rolling_mean("x", 0).expect_err("zero").kind(), ErrorKind::Value);

        let text = DataFrame::from_records(&[Record::new().with("s", "a")]).expect("frame");
        assert_eq!(text.rolling_mean("s", 1).expect_err("text").kind(), ErrorKind::Type);
    }

    // ── Expanding ──

    #[test]
    fn expanding_skips_leading_and_inner_nulls() {
        let frame = series(&[None, Some(2.0), None, Some(4.0)]);
        let mean = frame.expanding_mean("x").expect("mean");
        assert_close(
            &floats(&mean, "x_expanding_mean"),
            &[None, Some(2.0), Some(2.0), Some(3.0)],
        );
        let sum = frame.expanding_sum("x").expect("sum");
        assert_close(
            &floats(&sum, "x_expanding_sum"),
            &[None, Some(2.0), Some(2.0), Some(6.0)],
        );
    }

    #[test]
    fn expanding_std_starts_at_zero() {
        let frame = series(&[Some(1.0), Some(3.0)]);
        let out = frame.expanding_std("x").expect("std");
        assert_close(&floats(&out, "x_expanding_std"), &[Some(0.0), Some(1.0)]);
    }

    // ── Rank ──

    #[test]
    fn rank_methods_on_ties() {
        let frame = series(&[Some(3.0), Some(1.0), Some(3.0), Some(2.0)]);
        let cases = [
            ("average", [3.5, 1.0, 3.5, 2.0]),
            ("min", [3.0, 1.0, 3.0, 2.0]),
            ("max", [4.0, 1.0, 4.0, 2.0]),
            ("first", [3.0, 1.0, 4.0, 2.0]),
            ("dense", [3.0, 1.0, 3.0, 2.0]),
        ];
        for (method, expected) in cases {
            let out = frame.rank("x", method).expect("rank");
            let expected: Vec<Option<f64>> = expected.iter().copied().map(Some).collect();
            assert_close(&floats(&out, "x_rank"), &expected);
        }
    }

    #[test]
    fn rank_keeps_nulls_and_rejects_unknown_method() {
        let frame = series(&[Some(5.0), None, Some(1.0)]);
        let out = frame.rank("x", "min").expect("rank");
        assert_close(&floats(&out, "x_rank"), &[Some(2.0), None, Some(1.0)]);
        assert_eq!(frame.rank("x", "fancy").expect_err("method").kind(), ErrorKind::Value);
        assert_eq!(frame.rank("y", "min").expect_err("column").kind(), ErrorKind::Lookup);
    }

    // ── pct_change ──

    #[test]
    fn pct_change_of_steady_growth() {
        let frame = series(&[Some(100.0), Some(110.0), Some(121.0)]);
        let out = frame.pct_change("x").expect("pct");
        assert_close(&floats(&out, "x_pct_change"), &[None, Some(10.0), Some(10.0)]);
    }

    #[test]
    fn pct_change_after_zero_or_null_is_null() {
        let frame = series(&[Some(0.0), Some(5.0), None, Some(2.0)]);
        let out = frame.pct_change("x").expect("pct");
        assert_eq!(
            out.require("x_pct_change").expect("col").to_values(),
            vec![Scalar::Null; 4]
        );
    }

    #[test]
    fn deriving_twice_replaces_in_place() {
        let frame = series(&[Some(1.0), Some(2.0)]);
        let once = frame.rank("x", "min").expect("rank");
        let twice = once.rank("x", "min").expect("rank");
        assert_eq!(twice.columns(), ["x", "x_rank"]);
        assert_eq!(once, twice);
    }
}
