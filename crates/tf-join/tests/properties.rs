#![forbid(unsafe_code)]

//! Property tests for join cardinality.

use proptest::prelude::*;

use tf_frame::{DataFrame, Record};
use tf_join::{JoinExecutionOptions, JoinType, cross_join, join, join_with_options};
use tf_types::{DType, Scalar};

// ---------------------------------------------------------------------------
// Strategy generators
// ---------------------------------------------------------------------------

/// Narrow key domain with nulls so duplicates and unmatched rows are common.
fn arb_key() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![
        5 => (0i64..6).prop_map(Some),
        1 => Just(None),
    ]
}

fn arb_side(key: &'static str, payload: &'static str, max_len: usize) -> impl Strategy<Value = DataFrame> {
    proptest::collection::vec(arb_key(), 1..=max_len).prop_map(move |keys| {
        let records: Vec<Record> = keys
            .into_iter()
            .enumerate()
            .map(|(row, k)| Record::new().with(key, k).with(payload, row as i64))
            .collect();
        let mut frame = DataFrame::from_records(&records).expect("generated frame");
        frame.cast_column(key, DType::Int64).expect("pin key kind");
        frame
    })
}

fn naive_inner_count(left: &DataFrame, right: &DataFrame, left_key: &str, right_key: &str) -> usize {
    let l = left.require(left_key).expect("left key").to_values();
    let r = right.require(right_key).expect("right key").to_values();
    l.iter()
        .filter(|v| !v.is_missing())
        .map(|lv| r.iter().filter(|rv| *rv == lv).count())
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    /// Inner-join cardinality does not depend on operand order.
    #[test]
    fn prop_inner_join_row_count_is_symmetric(
        left in arb_side("lk", "lv", 25),
        right in arb_side("rk", "rv", 25),
    ) {
        let forward = join(&left, &right, &["lk"], &["rk"], JoinType::Inner).expect("forward");
        let backward = join(&right, &left, &["rk"], &["lk"], JoinType::Inner).expect("backward");
        prop_assert_eq!(forward.len(), backward.len());
        prop_assert_eq!(forward.len(), naive_inner_count(&left, &right, "lk", "rk"));
    }

    /// Cross-join cardinality is the product of the input lengths.
    #[test]
    fn prop_cross_join_row_count_is_product(
        left in arb_side("lk", "lv", 15),
        right in arb_side("rk", "rv", 15),
    ) {
        let out = cross_join(&left, &right).expect("cross");
        prop_assert_eq!(out.len(), left.len() * right.len());
        prop_assert_eq!(out.num_columns(), 4);
    }

    /// Left and right joins keep every row of their preserved side.
    #[test]
    fn prop_outer_shapes_cover_preserved_side(
        left in arb_side("k", "lv", 20),
        right in arb_side("k", "rv", 20),
    ) {
        let left_out = join(&left, &right, &["k"], &["k"], JoinType::Left).expect("left");
        let right_out = join(&left, &right, &["k"], &["k"], JoinType::Right).expect("right");
        let outer = join(&left, &right, &["k"], &["k"], JoinType::Outer).expect("outer");

        let lv: Vec<Scalar> = left_out.require("lv").expect("lv").iter().filter(|v| !v.is_missing()).collect();
        let mut distinct_lv = lv.clone();
        distinct_lv.dedup();
        prop_assert!(left_out.len() >= left.len());
        prop_assert!(right_out.len() >= right.len());
        prop_assert!(outer.len() >= left_out.len().max(right_out.len()));
        prop_assert_eq!(distinct_lv.len(), left.len());
    }

    /// Arena and global-allocator execution produce identical frames.
    #[test]
    fn prop_arena_matches_global_allocator(
        left in arb_side("k", "lv", 20),
        right in arb_side("k", "rv", 20),
    ) {
        let global = join_with_options(
            &left,
            &right,
            &["k"],
            &["k"],
            JoinType::Outer,
            JoinExecutionOptions { use_arena: false, arena_budget_bytes: 0 },
        )
        .expect("global");
        let arena = join(&left, &right, &["k"], &["k"], JoinType::Outer).expect("arena");
        prop_assert_eq!(arena, global);
    }
}
