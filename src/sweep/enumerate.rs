//! Deterministic join enumeration over the sweep substrate.
//!
//! The enumerator runs the same sweep as the counting pass but, at every
//! start event, reports the opposite side's pattern-A partners and then its
//! pattern-B partners instead of counting them. Pair order is deterministic
//! for a fixed dataset and tie-break (cover buckets in query order,
//! insertion order within each bucket) but is not a portable contract
//! across implementations.
//!
//! Generic scan-based enumeration over the active set would be
//! quadratic on adversarial inputs; reporting through the segment trees
//! keeps enumeration at O(log m) per event plus output size.

use serde::Serialize;

use crate::dataset::Dataset;
use crate::sweep::context::{SweepContext, NO_START_ID};
use crate::sweep::events::{EventKind, Side};
use crate::PairId;

/// Lightweight counters collected during enumeration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub num_events: u64,
    /// Candidate intersection evaluations (equals output for this
    /// enumerator: the trees only ever report true partners).
    pub candidate_checks: u64,
    pub output_pairs: u64,
    pub active_max_r: u64,
    pub active_max_s: u64,
}

impl JoinStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Scan,
    Emit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Pattern {
    A,
    B,
}

/// Streaming enumerator of all intersecting pairs.
///
/// Yields pairs in `R`,`S` id order regardless of which side the query
/// rectangle came from. Leaves the context's active sets empty when the
/// stream ends, and on every [`SweepEnumerator::reset`].
pub struct SweepEnumerator<'a> {
    ctx: &'a mut SweepContext,
    ds: &'a Dataset,

    pos: usize,
    stage: Stage,
    pattern: Pattern,

    // Current start event (the query rectangle q).
    q_side: Side,
    q_index: u32,
    q_ylo: u32,
    q_yhi: u32,

    // Opposite-side handles buffered for the current pattern.
    buf: Vec<u32>,
    buf_i: usize,

    stats: JoinStats,
    active_r: u64,
    active_s: u64,
}

impl<'a> SweepEnumerator<'a> {
    pub fn new(ctx: &'a mut SweepContext, ds: &'a Dataset) -> Self {
        debug_assert!(ctx.built());
        let mut e = Self {
            ctx,
            ds,
            pos: 0,
            stage: Stage::Scan,
            pattern: Pattern::A,
            q_side: Side::R,
            q_index: 0,
            q_ylo: 0,
            q_yhi: 0,
            buf: Vec::new(),
            buf_i: 0,
            stats: JoinStats::default(),
            active_r: 0,
            active_s: 0,
        };
        e.reset();
        e
    }

    /// Rewinds the stream to the first pair.
    pub fn reset(&mut self) {
        self.ctx.reset_active();
        self.pos = 0;
        self.stage = Stage::Scan;
        self.pattern = Pattern::A;
        self.buf.clear();
        self.buf_i = 0;
        self.active_r = 0;
        self.active_s = 0;
        self.stats.reset();
        self.stats.num_events = self.ctx.events().len() as u64;
    }

    pub fn stats(&self) -> &JoinStats {
        &self.stats
    }

    fn pair_for(&self, other_handle: u32) -> PairId {
        match self.q_side {
            Side::R => PairId::new(
                self.ds.r.id(self.q_index as usize),
                self.ds.s.id(other_handle as usize),
            ),
            Side::S => PairId::new(
                self.ds.r.id(other_handle as usize),
                self.ds.s.id(self.q_index as usize),
            ),
        }
    }

    /// Produces the next intersecting pair, or `None` at stream end.
    pub fn next_pair(&mut self) -> Option<PairId> {
        loop {
            if self.stage == Stage::Emit {
                if self.buf_i < self.buf.len() {
                    let other = self.buf[self.buf_i];
                    self.buf_i += 1;
                    self.stats.output_pairs += 1;
                    self.stats.candidate_checks += 1;
                    return Some(self.pair_for(other));
                }

                if self.pattern == Pattern::A {
                    // Switch to pattern B for the same query.
                    self.pattern = Pattern::B;
                    self.buf.clear();
                    self.buf_i = 0;
                    let other = self.ctx.active(self.q_side.other());
                    other.report_b(self.q_ylo, self.q_yhi, &mut self.buf);
                    continue;
                }

                // Both patterns done: now the query becomes active.
                self.ctx.insert_active(self.q_side, self.q_index);
                match self.q_side {
                    Side::R => {
                        self.active_r += 1;
                        self.stats.active_max_r = self.stats.active_max_r.max(self.active_r);
                    }
                    Side::S => {
                        self.active_s += 1;
                        self.stats.active_max_s = self.stats.active_max_s.max(self.active_s);
                    }
                }
                self.stage = Stage::Scan;
                self.pos += 1;
                continue;
            }

            if self.pos >= self.ctx.events().len() {
                // Leave the context clean for the next pass.
                self.ctx.reset_active();
                return None;
            }

            let ev = self.ctx.events()[self.pos];
            if ev.kind == EventKind::End {
                self.ctx.erase_active(ev.side, ev.index);
                match ev.side {
                    Side::R => self.active_r -= 1,
                    Side::S => self.active_s -= 1,
                }
                self.pos += 1;
                continue;
            }

            debug_assert_ne!(self.ctx.start_id_at(self.pos), NO_START_ID);

            // Start event: buffer pattern A before inserting q.
            self.q_side = ev.side;
            self.q_index = ev.index;
            self.q_ylo = self.ctx.ylo_rank(ev.side, ev.index);
            self.q_yhi = self.ctx.yhi_lb_rank(ev.side, ev.index);

            self.pattern = Pattern::A;
            self.buf.clear();
            self.buf_i = 0;
            let other = self.ctx.active(ev.side.other());
            other.report_a(self.q_ylo, &mut self.buf);
            self.stage = Stage::Emit;
        }
    }

    /// Drains the stream into a vector (test and materialization helper).
    pub fn collect_pairs(&mut self) -> Vec<PairId> {
        let mut out = Vec::new();
        while let Some(p) = self.next_pair() {
            out.push(p);
        }
        out
    }
}

impl Iterator for SweepEnumerator<'_> {
    type Item = PairId;

    fn next(&mut self) -> Option<PairId> {
        self.next_pair()
    }
}
