//! Brute-force join oracle for small-scale verification.
//!
//! A plain O(|R|·|S|) double loop over the half-open intersection predicate.
//! Used as ground truth for counts, pair sets, and sampling-quality checks;
//! never on the hot path.

use crate::dataset::Relation;
use crate::PairId;

/// Exact |J| by exhaustive comparison.
pub fn count_naive(r: &Relation, s: &Relation) -> u64 {
    let mut count = 0u64;
    for rb in &r.rects {
        for sb in &s.rects {
            if rb.intersects(sb) {
                count += 1;
            }
        }
    }
    count
}

/// Calls `emit` for every intersecting pair in lexicographic `(i, j)` index
/// order. `emit` returning `false` stops the enumeration early; the return
/// value says whether the full enumeration finished.
pub fn enumerate_naive(r: &Relation, s: &Relation, mut emit: impl FnMut(PairId) -> bool) -> bool {
    for (i, rb) in r.rects.iter().enumerate() {
        let rid = r.id(i);
        for (j, sb) in s.rects.iter().enumerate() {
            if rb.intersects(sb) && !emit(PairId::new(rid, s.id(j))) {
                return false;
            }
        }
    }
    true
}

/// Collects every intersecting pair. Quadratic memory on dense joins; test
/// datasets only.
pub fn collect_naive_pairs(r: &Relation, s: &Relation) -> Vec<PairId> {
    let mut out = Vec::new();
    enumerate_naive(r, s, |p| {
        out.push(p);
        true
    });
    out
}

/// Deterministic streaming oracle enumerator in `(i, j)` index order.
pub struct NaiveJoinStream<'a> {
    r: &'a Relation,
    s: &'a Relation,
    i: usize,
    j: usize,
}

impl<'a> NaiveJoinStream<'a> {
    pub fn new(r: &'a Relation, s: &'a Relation) -> Self {
        Self { r, s, i: 0, j: 0 }
    }

    pub fn reset(&mut self) {
        self.i = 0;
        self.j = 0;
    }

    pub fn next_pair(&mut self) -> Option<PairId> {
        while self.i < self.r.rects.len() {
            let rb = &self.r.rects[self.i];
            while self.j < self.s.rects.len() {
                let j = self.j;
                self.j += 1;
                if rb.intersects(&self.s.rects[j]) {
                    return Some(PairId::new(self.r.id(self.i), self.s.id(j)));
                }
            }
            self.i += 1;
            self.j = 0;
        }
        None
    }
}

impl Iterator for NaiveJoinStream<'_> {
    type Item = PairId;

    fn next(&mut self) -> Option<PairId> {
        self.next_pair()
    }
}
