//! Per-side active index: the two trees over one compressed y-domain.
//!
//! For a query rectangle `q` with y-ranks `(q_ylo, q_yhi)` the partners on
//! the opposite side split into two disjoint patterns whose union is exactly
//! the set of active rectangles whose y-interval intersects `q`'s:
//!
//! - pattern A: partners whose y-interval contains `q_ylo` (ties on the
//!   lower endpoint land here) — answered by the stabbing tree;
//! - pattern B: partners whose lower y endpoint lies strictly inside
//!   `(q_ylo, q_yhi)` — answered by the range-point tree over
//!   `[q_ylo + 1, q_yhi)`.
//!
//! Keeping both trees in parallel keeps every count, report, and draw at
//! O(log m + k).

use super::{EmptySelection, RangePointTree, StabbingTree};
use crate::rng::Rng;

/// Paired stabbing + range-point index for one relation side.
#[derive(Clone, Debug, Default)]
pub struct ActiveIndex {
    num_handles: u32,
    m: u32,
    stab: StabbingTree,
    points: RangePointTree,
}

impl ActiveIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes both skeletons over ranks `[0, m)`.
    pub fn init(&mut self, num_handles: u32, num_ranks: u32) {
        self.num_handles = num_handles;
        self.m = num_ranks;
        self.stab.init(num_handles, num_ranks);
        self.points.init(num_handles, num_ranks);
    }

    /// Empties membership in both trees, keeping the skeletons.
    pub fn reset_active(&mut self) {
        self.stab.reset_active();
        self.points.reset_active();
    }

    /// Activates a rectangle: interval `[ylo_rank, yhi_lb_rank)` in the
    /// stabbing tree and key `ylo_rank` in the point tree.
    pub fn insert(&mut self, handle: u32, ylo_rank: u32, yhi_lb_rank: u32) {
        debug_assert!(handle < self.num_handles);
        debug_assert!(ylo_rank < self.m);
        // yhi_lb_rank may equal m (half-open upper rank).
        self.stab.insert(handle, ylo_rank, yhi_lb_rank);
        self.points.insert(handle, ylo_rank);
    }

    pub fn erase(&mut self, handle: u32) {
        debug_assert!(handle < self.num_handles);
        self.stab.erase(handle);
        self.points.erase(handle);
    }

    /// Pattern-B query range for `q`, clamped into `[0, m]`.
    #[inline]
    fn b_range(&self, q_ylo: u32, q_yhi_lb: u32) -> (u32, u32) {
        let l = (q_ylo + 1).min(self.m);
        let r = q_yhi_lb.min(self.m);
        (l, r)
    }

    /// Partners whose y-interval contains `q_ylo`.
    #[inline]
    pub fn count_a(&self, q_ylo: u32) -> u64 {
        self.stab.count(q_ylo)
    }

    /// Partners whose lower y endpoint lies in `(q_ylo, q_yhi)`.
    #[inline]
    pub fn count_b(&self, q_ylo: u32, q_yhi_lb: u32) -> u64 {
        if self.m == 0 {
            return 0;
        }
        let (l, r) = self.b_range(q_ylo, q_yhi_lb);
        self.points.count_range(l, r)
    }

    pub fn sample_a(
        &self,
        q_ylo: u32,
        k: u32,
        rng: &mut Rng,
        out: &mut Vec<u32>,
    ) -> Result<(), EmptySelection> {
        self.stab.sample(q_ylo, k, rng, out)
    }

    pub fn sample_b(
        &self,
        q_ylo: u32,
        q_yhi_lb: u32,
        k: u32,
        rng: &mut Rng,
        out: &mut Vec<u32>,
    ) -> Result<(), EmptySelection> {
        let (l, r) = self.b_range(q_ylo, q_yhi_lb);
        self.points.sample_range(l, r, k, rng, out)
    }

    pub fn report_a(&self, q_ylo: u32, out: &mut Vec<u32>) {
        self.stab.report(q_ylo, out);
    }

    pub fn report_b(&self, q_ylo: u32, q_yhi_lb: u32, out: &mut Vec<u32>) {
        if self.m == 0 {
            return;
        }
        let (l, r) = self.b_range(q_ylo, q_yhi_lb);
        self.points.report_range(l, r, out);
    }
}
