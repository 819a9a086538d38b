#![forbid(unsafe_code)]

//! Descriptive statistics over a [`DataFrame`]. Scalar results come back bare;
//! `describe`, `corr` and `cov` return small frames.

use std::collections::{HashMap, HashSet};

use tf_columnar::Column;
use tf_frame::{DataFrame, FrameError};
use tf_types::{
    Scalar, ScalarKey, excess_kurtosis, nanmax, nanmean, nanmin, nanstd, quantile_sorted, skewness,
};

/// Row labels of [`describe`], in output order.
pub const DESCRIBE_STATISTICS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

fn numeric_values(frame: &DataFrame, column: &str, op: &'static str) -> Result<Vec<f64>, FrameError> {
    Ok(frame.require_numeric(column, op)?.valid_f64s(op)?)
}

fn numeric_columns(frame: &DataFrame) -> Vec<(&str, &Column)> {
    frame
        .iter_columns()
        .filter(|(_, column)| column.dtype().is_numeric())
        .collect()
}

fn describe_values(values: &[f64]) -> [f64; 8] {
    if values.is_empty() {
        return [0.0; 8];
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let quartile = |q| quantile_sorted(&sorted, q).unwrap_or(0.0);
    [
        values.len() as f64,
        nanmean(values).unwrap_or(0.0),
        nanstd(values, 0).unwrap_or(0.0),
        nanmin(values).unwrap_or(0.0),
        quartile(0.25),
        quartile(0.5),
        quartile(0.75),
        nanmax(values).unwrap_or(0.0),
    ]
}

/// Summary table: a `statistic` label column plus one float column per numeric column.
///
/// Standard deviation is the population form. A column without values reports zeros.
pub fn describe(frame: &DataFrame) -> Result<DataFrame, FrameError> {
    let mut guard = tf_runtime::begin("describe");
    guard.rows(frame.len());

    let mut pairs = vec![(
        "statistic".to_owned(),
        Column::from_strings(DESCRIBE_STATISTICS.iter().map(|s| Some(*s))),
    )];
    for (name, column) in numeric_columns(frame) {
        let stats = describe_values(&column.valid_f64s("describe")?);
        pairs.push((name.to_owned(), Column::from_f64s(stats.into_iter().map(Some))));
    }
    DataFrame::from_columns(pairs)
}

/// Population skewness; `0.0` below three values or at zero variance.
pub fn skew(frame: &DataFrame, column: &str) -> Result<f64, FrameError> {
    Ok(skewness(&numeric_values(frame, column, "skew")?))
}

/// Population excess kurtosis; `0.0` below four values or at zero variance.
pub fn kurtosis(frame: &DataFrame, column: &str) -> Result<f64, FrameError> {
    Ok(excess_kurtosis(&numeric_values(frame, column, "kurtosis")?))
}

/// Linearly interpolated quantile of the non-null values, `0 <= q <= 1`.
pub fn quantile(frame: &DataFrame, column: &str, q: f64) -> Result<f64, FrameError> {
    let values = numeric_values(frame, column, "quantile")?;
    if !(0.0..=1.0).contains(&q) {
        return Err(FrameError::InvalidArgument(format!(
            "quantile {q} is outside [0, 1]"
        )));
    }
    let mut sorted = values;
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q).ok_or_else(|| {
        FrameError::InvalidArgument(format!("column '{column}' has no values for a quantile"))
    })
}

/// Most frequent non-null value; ties go to the value seen first. `Null` when none.
pub fn mode(frame: &DataFrame, column: &str) -> Result<Scalar, FrameError> {
    let source = frame.require(column)?;
    // key -> (count, first row)
    let mut counts = HashMap::<ScalarKey, (usize, usize)>::new();
    for (row, value) in source.iter().enumerate() {
        if value.is_missing() {
            continue;
        }
        counts.entry(ScalarKey::from(&value)).or_insert((0, row)).0 += 1;
    }
    let best = counts
        .values()
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, row)| *row);
    Ok(best.map_or(Scalar::Null, |row| source.get(row)))
}

/// Distinct non-null values.
pub fn nunique(frame: &DataFrame, column: &str) -> Result<usize, FrameError> {
    let source = frame.require(column)?;
    Ok(source
        .iter()
        .filter(|value| !value.is_missing())
        .map(|value| ScalarKey::from(&value))
        .collect::<HashSet<_>>()
        .len())
}

/// Rows where both columns are present.
fn paired_values(
    frame: &DataFrame,
    a: &str,
    b: &str,
    op: &'static str,
) -> Result<(Vec<f64>, Vec<f64>), FrameError> {
    let left = frame.require_numeric(a, op)?.to_f64_options(op)?;
    let right = frame.require_numeric(b, op)?.to_f64_options(op)?;
    Ok(left
        .into_iter()
        .zip(right)
        .filter_map(|(x, y)| x.zip(y))
        .unzip())
}

fn covariance(xs: &[f64], ys: &[f64]) -> f64 {
    let (Some(mx), Some(my)) = (nanmean(xs), nanmean(ys)) else {
        return 0.0;
    };
    xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum::<f64>() / xs.len() as f64
}

fn correlation(xs: &[f64], ys: &[f64]) -> f64 {
    let (Some(sx), Some(sy)) = (nanstd(xs, 0), nanstd(ys, 0)) else {
        return 0.0;
    };
    if sx == 0.0 || sy == 0.0 {
        return 0.0;
    }
    covariance(xs, ys) / (sx * sy)
}

/// Pearson correlation over pairwise-complete rows; `0.0` when either side is constant or empty.
pub fn corr_with(frame: &DataFrame, a: &str, b: &str) -> Result<f64, FrameError> {
    let (xs, ys) = paired_values(frame, a, b, "corr")?;
    Ok(correlation(&xs, &ys))
}

/// Population covariance over pairwise-complete rows; `0.0` when empty.
pub fn cov_with(frame: &DataFrame, a: &str, b: &str) -> Result<f64, FrameError> {
    let (xs, ys) = paired_values(frame, a, b, "cov")?;
    Ok(covariance(&xs, &ys))
}

fn pairwise_matrix(
    frame: &DataFrame,
    op: &'static str,
    statistic: impl Fn(&str, &str) -> Result<f64, FrameError>,
) -> Result<DataFrame, FrameError> {
    let mut guard = tf_runtime::begin(op);
    guard.rows(frame.len());

    let names: Vec<&str> = numeric_columns(frame).into_iter().map(|(name, _)| name).collect();
    let mut pairs = vec![(
        "column".to_owned(),
        Column::from_strings(names.iter().map(|name| Some(*name))),
    )];
    for &col in &names {
        let cells = names
            .iter()
            .map(|&row| statistic(row, col).map(Some))
            .collect::<Result<Vec<_>, _>>()?;
        pairs.push((col.to_owned(), Column::from_f64s(cells)));
    }
    DataFrame::from_columns(pairs)
}

/// Correlation matrix of the numeric columns; the diagonal is exactly `1.0`.
pub fn corr(frame: &DataFrame) -> Result<DataFrame, FrameError> {
    pairwise_matrix(frame, "corr", |a, b| {
        if a == b {
            Ok(1.0)
        } else {
            corr_with(frame, a, b)
        }
    })
}

/// Population covariance matrix of the numeric columns.
pub fn cov(frame: &DataFrame) -> Result<DataFrame, FrameError> {
    pairwise_matrix(frame, "cov", |a, b| cov_with(frame, a, b))
}

#[cfg(test)]
mod tests {
    use tf_frame::{DataFrame, Record};
    use tf_types::{DType, ErrorKind, Scalar};

    use super::{
        DESCRIBE_STATISTICS, corr, corr_with, cov, cov_with, describe, kurtosis, mode, nunique,
        quantile, skew,
    };

    fn measurements() -> DataFrame {
        DataFrame::from_records(&[
            Record::new().with("x", 1.0).with("y", 2).with("label", "a").with("flag", true),
            Record::new().with("x", 2.0).with("y", 4).with("label", "b").with("flag", false),
            Record::new().with("x", 3.0).with("y", 6).with("label", "a").with("flag", true),
            Record::new().with("x", 4.0).with("y", 8).with("label", "c").with("flag", false),
            Record::new()
                .with("x", Scalar::Null)
                .with("y", 1)
                .with("label", Scalar::Null)
                .with("flag", true),
        ])
        .expect("frame")
    }

    fn floats(frame: &DataFrame, name: &str) -> Vec<f64> {
        frame
            .require(name)
            .expect("column")
            .valid_f64s("test")
            .expect("numeric")
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // ── describe ──

    #[test]
    fn describe_covers_numeric_columns() {
        let out = describe(&measurements()).expect("describe");
        assert_eq!(out.shape(), (8, 3));
        assert_eq!(out.columns(), ["statistic", "x", "y"]);
        assert_eq!(
            out.require("statistic").expect("labels").to_values(),
            DESCRIBE_STATISTICS
                .iter()
                .map(|s| Scalar::Utf8((*s).to_owned()))
                .collect::<Vec<_>>()
        );
        let x = floats(&out, "x");
        assert!(close(x[0], 4.0));
        assert!(close(x[1], 2.5));
        assert!(close(x[2], 1.25_f64.sqrt()));
        assert!(close(x[3], 1.0));
        assert!(close(x[4], 1.75));
        assert!(close(x[5], 2.5));
        assert!(close(x[6], 3.25));
        assert!(close(x[7], 4.0));
        assert_eq!(out.require("y").expect("y").dtype(), DType::Float64);
    }

    #[test]
    fn describe_without_numeric_columns_keeps_labels() {
        let frame = DataFrame::from_records(&[Record::new().with("s", "a")]).expect("frame");
        let out = describe(&frame).expect("describe");
        assert_eq!(out.shape(), (8, 1));
    }

    #[test]
    fn describe_of_empty_column_is_zeros() {
        let frame = measurements()
            .filter("y", ">", &Scalar::Int64(100))
            .expect("empty");
        let out = describe(&frame).expect("describe");
        assert_eq!(floats(&out, "x"), vec![0.0; 8]);
    }

    // ── Moments & quantiles ──

    #[test]
    fn skew_and_kurtosis_neutral_cases() {
        let frame = measurements();
        assert!(close(skew(&frame, "x").expect("skew"), 0.0));
        assert!(close(kurtosis(&frame, "x").expect("kurt"), -1.36));

        let short = DataFrame::from_records(&[
            Record::new().with("v", 1.0),
            Record::new().with("v", 9.0),
        ])
        .expect("frame");
        assert_eq!(skew(&short, "v").expect("skew"), 0.0);
        assert_eq!(kurtosis(&short, "v").expect("kurt"), 0.0);
        assert_eq!(skew(&frame, "label").expect_err("text").kind(), ErrorKind::Type);
    }

    #[test]
    fn quantile_interpolates_and_validates() {
        let frame = measurements();
        assert!(close(quantile(&frame, "x", 0.5).expect("median"), 2.5));
        assert!(close(quantile(&frame, "y", 0.0).expect("min"), 1.0));
        assert_eq!(quantile(&frame, "x", 1.5).expect_err("range").kind(), ErrorKind::Value);
        assert_eq!(quantile(&frame, "label", 0.5).expect_err("text").kind(), ErrorKind::Type);

        let empty = frame.filter("y", ">", &Scalar::Int64(100)).expect("empty");
        assert_eq!(quantile(&empty, "x", 0.5).expect_err("empty").kind(), ErrorKind::Value);
    }

    // ── Frequencies ──

    #[test]
    fn mode_prefers_first_seen_on_ties() {
        let frame = measurements();
        assert_eq!(mode(&frame, "label").expect("mode"), Scalar::Utf8("a".into()));
        assert_eq!(mode(&frame, "flag").expect("mode"), Scalar::Bool(true));
        assert_eq!(mode(&frame, "x").expect("mode"), Scalar::Float64(1.0));

        let nulls = DataFrame::from_records(&[Record::new().with("n", Scalar::Null)]).expect("frame");
        assert_eq!(mode(&nulls, "n").expect("mode"), Scalar::Null);
    }

    #[test]
    fn nunique_ignores_nulls() {
        let frame = measurements();
        assert_eq!(nunique(&frame, "label").expect("labels"), 3);
        assert_eq!(nunique(&frame, "x").expect("x"), 4);
        assert_eq!(nunique(&frame, "missing").expect_err("lookup").kind(), ErrorKind::Lookup);
    }

    // ── Correlation & covariance ──

    #[test]
    fn pairwise_statistics_skip_incomplete_rows() {
        let frame = measurements();
        assert!(close(corr_with(&frame, "x", "y").expect("corr"), 1.0));
        assert!(close(cov_with(&frame, "x", "y").expect("cov"), 2.5));
        assert_eq!(corr_with(&frame, "x", "nope").expect_err("lookup").kind(), ErrorKind::Lookup);
    }

    #[test]
    fn constant_column_correlates_as_zero() {
        let frame = DataFrame::from_records(&[
            Record::new().with("a", 1.0).with("b", 5.0),
            Record::new().with("a", 2.0).with("b", 5.0),
        ])
        .expect("frame");
        assert_eq!(corr_with(&frame, "a", "b").expect("corr"), 0.0);
    }

    #[test]
    fn matrices_are_square_with_unit_diagonal() {
        let frame = measurements();
        let matrix = corr(&frame).expect("corr");
        assert_eq!(matrix.columns(), ["column", "x", "y"]);
        assert_eq!(matrix.len(), 2);
        assert_eq!(floats(&matrix, "x")[0], 1.0);
        assert_eq!(floats(&matrix, "y")[1], 1.0);

        let covariance = cov(&frame).expect("cov");
        assert!(close(floats(&covariance, "x")[0], 1.25));
        assert!(close(floats(&covariance, "x")[1], floats(&covariance, "y")[0]));
    }
}
