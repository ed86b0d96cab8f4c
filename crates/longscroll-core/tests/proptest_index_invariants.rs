//! Property-based invariant tests for spans and the row-height index.
//!
//! These verify laws that must hold for **any** input:
//!
//! 1. `clamp_to` output is contained in both operands when they intersect
//!    and is empty when they are disjoint.
//! 2. `clamp_to` is idempotent against itself: `r.clamp_to(r) == r`.
//! 3. Prefix/inverse round trip: `index_at(prefix_sum(i)) == i` and
//!    `index_at(prefix_sum(i+1) - 1) == i` whenever heights are >= 1 px.
//! 4. Height updates change `total()` by exactly the sum of the deltas.
//! 5. `prefix_sum` is monotone non-decreasing.

use longscroll_core::{RowHeightIndex, RowSpan};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

fn span_strategy() -> impl Strategy<Value = RowSpan> {
    (-1000i64..=1000, 0i64..=500).prop_map(|(top, len)| RowSpan::new(top, top + len).unwrap())
}

/// Integer-valued heights keep every float sum exact.
fn heights_strategy(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    proptest::collection::vec((1u32..=200).prop_map(f64::from), 1..=max_len)
}

// ═════════════════════════════════════════════════════════════════════════
// 1–2. clamp_to laws
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clamp_to_contained_in_both_or_empty(a in span_strategy(), b in span_strategy()) {
        let clamped = a.clamp_to(&b);
        let intersects = a.top() < b.bot() && b.top() < a.bot();
        if intersects {
            prop_assert!(a.contains_span(&clamped));
            prop_assert!(b.contains_span(&clamped));
        } else {
            prop_assert!(clamped.is_empty());
        }
    }

    #[test]
    fn clamp_to_self_is_identity(a in span_strategy()) {
        prop_assert_eq!(a.clamp_to(&a), a);
    }

    #[test]
    fn clamp_value_lands_inside(a in span_strategy(), v in -2000i64..=2000) {
        prop_assume!(!a.is_empty());
        let clamped = a.clamp_value(v);
        prop_assert!(a.contains(clamped));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Prefix/inverse round trip
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn index_at_round_trips(heights in heights_strategy(300)) {
        let idx = RowHeightIndex::from_heights(heights.clone(), 30.0);
        for i in 0..heights.len() {
            prop_assert_eq!(idx.index_at(idx.prefix_sum(i)), i);
            prop_assert_eq!(idx.index_at(idx.prefix_sum(i + 1) - 1.0), i);
        }
        prop_assert_eq!(idx.index_at(idx.total()), heights.len());
    }

    #[test]
    fn prefix_sum_is_monotone(heights in heights_strategy(300)) {
        let idx = RowHeightIndex::from_heights(heights.clone(), 30.0);
        let mut prev = 0.0;
        for i in 0..=heights.len() {
            let sum = idx.prefix_sum(i);
            prop_assert!(sum >= prev);
            prev = sum;
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Height updates conserve totals
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn set_changes_total_by_delta_sum(
        heights in heights_strategy(200),
        updates in proptest::collection::vec((0usize..200, (1u32..=400).prop_map(f64::from)), 1..=50),
    ) {
        let mut idx = RowHeightIndex::from_heights(heights.clone(), 30.0);
        let before = idx.total();
        let mut expected_delta = 0.0;
        let mut current = heights;
        for (row, px) in updates {
            let row = row % current.len();
            expected_delta += px - current[row];
            current[row] = px;
            idx.set(row, px).unwrap();
        }
        prop_assert_eq!(idx.total(), before + expected_delta);
    }
}
