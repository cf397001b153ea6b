//! Shared sweep state: events, start-id map, y-rank tables, active indices.
//!
//! Built once per dataset and reused by every pass of every framework. The
//! context owns its event list, rank tables, and the two active-index
//! skeletons exclusively; passes mutate only the active membership and must
//! leave it empty when they finish.

use log::debug;

use crate::dataset::Dataset;
use crate::index::ActiveIndex;
use crate::phase::PhaseRecorder;
use crate::sweep::events::{build_sweep_events, Event, EventKind, Side, SideTieBreak};

/// Sentinel in the start-id map for end events.
pub const NO_START_ID: u32 = u32::MAX;

/// Everything the sweep passes share for one dataset.
///
/// Lifetimes of the pieces:
/// - events, start metadata, rank tables, and skeletons are created by
///   [`SweepContext::build`] and destroyed by [`SweepContext::reset`];
/// - active membership is created by insert at a start event and destroyed
///   by erase at the matching end event, within a single pass.
#[derive(Clone, Debug, Default)]
pub struct SweepContext {
    built: bool,
    tie: SideTieBreak,

    events: Vec<Event>,
    /// Dense 0..E-1 rank for start events, [`NO_START_ID`] for end events.
    start_id_of_event: Vec<u32>,
    /// Per start-id: which side and which relation index, so later passes
    /// can recover the rectangle without rescanning the event list.
    start_side: Vec<Side>,
    start_index: Vec<u32>,

    /// Sorted unique lower y endpoints across both relations.
    y_coords: Vec<f64>,
    /// Per side, per relation index: exact rank of lo[1] in `y_coords`.
    ylo_rank: [Vec<u32>; 2],
    /// Per side, per relation index: first rank >= hi[1] (half-open upper
    /// rank), in `[0, m]`.
    yhi_lb_rank: [Vec<u32>; 2],

    active: [ActiveIndex; 2],
}

impl SweepContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops all built state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Builds the sweep substrate for `ds`.
    ///
    /// Idempotent: building again after [`SweepContext::reset`] with the
    /// same inputs reproduces identical state. The dataset must already be
    /// validated; build itself cannot fail on a validated dataset.
    pub fn build(&mut self, ds: &Dataset, tie: SideTieBreak, phases: &mut PhaseRecorder) {
        self.reset();
        self.tie = tie;

        let n_r = ds.r.len();
        let n_s = ds.s.len();

        self.events =
            phases.scoped("build_events", |_| build_sweep_events(ds, 0, tie));

        // Dense start ids in event order.
        self.start_id_of_event = vec![NO_START_ID; self.events.len()];
        self.start_side.reserve(n_r + n_s);
        self.start_index.reserve(n_r + n_s);
        for (pos, ev) in self.events.iter().enumerate() {
            if ev.kind == EventKind::Start {
                self.start_id_of_event[pos] = self.start_side.len() as u32;
                self.start_side.push(ev.side);
                self.start_index.push(ev.index);
            }
        }

        phases.scoped("build_y_domain", |_| {
            self.y_coords.reserve(n_r + n_s);
            for rect in &ds.r.rects {
                self.y_coords.push(rect.lo[1]);
            }
            for rect in &ds.s.rects {
                self.y_coords.push(rect.lo[1]);
            }
            self.y_coords.sort_by(f64::total_cmp);
            self.y_coords.dedup();
        });

        let m = self.y_coords.len() as u32;

        phases.scoped("build_ranks", |_| {
            let lb = |v: f64| -> u32 {
                self.y_coords.partition_point(|&y| y < v) as u32
            };
            for (side, rel) in [(Side::R, &ds.r), (Side::S, &ds.s)] {
                let lo_ranks: Vec<u32> = rel.rects.iter().map(|b| lb(b.lo[1])).collect();
                let hi_ranks: Vec<u32> = rel.rects.iter().map(|b| lb(b.hi[1])).collect();
                debug_assert!(lo_ranks
                    .iter()
                    .zip(&rel.rects)
                    .all(|(&r, b)| r < m && self.y_coords[r as usize] == b.lo[1]));
                self.ylo_rank[side.idx()] = lo_ranks;
                self.yhi_lb_rank[side.idx()] = hi_ranks;
            }
        });

        phases.scoped("build_active_indices", |_| {
            self.active[Side::R.idx()].init(n_r as u32, m);
            self.active[Side::S.idx()].init(n_s as u32, m);
        });

        self.built = true;
        debug!(
            "sweep context built: dataset={} events={} starts={} y_ranks={}",
            ds.name,
            self.events.len(),
            self.start_side.len(),
            m
        );
    }

    #[inline]
    pub fn built(&self) -> bool {
        self.built
    }

    #[inline]
    pub fn tie_break(&self) -> SideTieBreak {
        self.tie
    }

    #[inline]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Start-id of the event at `pos`, or [`NO_START_ID`] for end events.
    #[inline]
    pub fn start_id_at(&self, pos: usize) -> u32 {
        self.start_id_of_event[pos]
    }

    /// Number of start events E.
    #[inline]
    pub fn start_count(&self) -> usize {
        self.start_side.len()
    }

    #[inline]
    pub fn start_side(&self, sid: u32) -> Side {
        self.start_side[sid as usize]
    }

    #[inline]
    pub fn start_index(&self, sid: u32) -> u32 {
        self.start_index[sid as usize]
    }

    /// Size m of the compressed y-domain.
    #[inline]
    pub fn y_domain_size(&self) -> u32 {
        self.y_coords.len() as u32
    }

    #[inline]
    pub fn ylo_rank(&self, side: Side, index: u32) -> u32 {
        self.ylo_rank[side.idx()][index as usize]
    }

    #[inline]
    pub fn yhi_lb_rank(&self, side: Side, index: u32) -> u32 {
        self.yhi_lb_rank[side.idx()][index as usize]
    }

    #[inline]
    pub fn active(&self, side: Side) -> &ActiveIndex {
        &self.active[side.idx()]
    }

    #[inline]
    pub fn active_mut(&mut self, side: Side) -> &mut ActiveIndex {
        &mut self.active[side.idx()]
    }

    /// Empties active membership on both sides (skeletons stay).
    pub fn reset_active(&mut self) {
        self.active[0].reset_active();
        self.active[1].reset_active();
    }

    /// Inserts the rectangle behind a start event into its own side.
    #[inline]
    pub fn insert_active(&mut self, side: Side, index: u32) {
        let ylo = self.ylo_rank[side.idx()][index as usize];
        let yhi = self.yhi_lb_rank[side.idx()][index as usize];
        self.active[side.idx()].insert(index, ylo, yhi);
    }

    /// Erases the rectangle behind an end event from its own side.
    #[inline]
    pub fn erase_active(&mut self, side: Side, index: u32) {
        self.active[side.idx()].erase(index);
    }
}
