//! Dataset strategies shared by the property tests.
//!
//! Coordinates come from a coarse half-unit grid so that equal endpoints,
//! touching edges, and duplicated lower-y values occur often: the
//! tie-break and half-open paths get exercised instead of avoided.

use proptest::prelude::*;

use sweepjoin::{Dataset, Rect, Relation};

/// One rectangle on the grid: origin cell plus positive extent.
fn arb_rect() -> impl Strategy<Value = Rect> {
    (0u32..16, 1u32..8, 0u32..16, 1u32..8).prop_map(|(x0, w, y0, h)| {
        let x0 = f64::from(x0) * 0.5;
        let y0 = f64::from(y0) * 0.5;
        Rect::from_bounds(x0, x0 + f64::from(w) * 0.5, y0, y0 + f64::from(h) * 0.5)
    })
}

fn arb_relation(name: &'static str, max_len: usize) -> impl Strategy<Value = Relation> {
    prop::collection::vec(arb_rect(), 0..=max_len).prop_map(move |rects| {
        let mut rel = Relation::new(name);
        for r in rects {
            rel.push(r);
        }
        rel
    })
}

/// A small random dataset with frequent coordinate collisions.
pub fn arb_dataset() -> impl Strategy<Value = Dataset> {
    (arb_relation("R", 12), arb_relation("S", 12))
        .prop_map(|(r, s)| Dataset::new("prop", r, s))
}
