#![forbid(unsafe_code)]

//! Grouped aggregation under profiling and debug logging.

use tf_frame::{DataFrame, Record};
use tf_groupby::groupby;
use tf_runtime::{
    clear_profiling_data, disable_debug, disable_profiling, enable_debug, enable_profiling,
    operation_stats,
};

fn orders() -> DataFrame {
    DataFrame::from_records(&[
        Record::new().with("shop", "north").with("total", 12),
        Record::new().with("shop", "south").with("total", 7),
        Record::new().with("shop", "north").with("total", 5),
    ])
    .expect("frame")
}

fn aggregate(frame: &DataFrame) -> Vec<DataFrame> {
    let grouped = groupby(frame, &["shop"]).expect("groupby");
    vec![
        grouped.sum("total").expect("sum"),
        grouped.mean("total").expect("mean"),
        grouped.count().expect("count"),
    ]
}

#[test]
fn profiling_does_not_change_aggregates() {
    let frame = orders();

    disable_debug();
    disable_profiling();
    clear_profiling_data();
    let quiet = aggregate(&frame);

    enable_debug();
    enable_profiling();
    let observed = aggregate(&frame);
    disable_debug();
    disable_profiling();

    assert_eq!(quiet, observed);
    let stats = operation_stats("groupby_agg").expect("recorded");
    assert_eq!(stats.count, 3);
    assert_eq!(stats.total_rows, 3 * frame.len() as u64);

    clear_profiling_data();
}
