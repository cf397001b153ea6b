//! Sweep event generation and the fixed total order.
//!
//! For a sweep along `axis`, every rectangle emits a start event at
//! `lo[axis]` and an end event at `hi[axis]`. The sort order is:
//!
//! 1. coordinate ascending,
//! 2. end before start at the same coordinate (half-open boxes: an object
//!    ending at `x` is not active for an object starting at `x`),
//! 3. object id ascending,
//! 4. side per the configured tie-break (only when ids tie),
//! 5. relation index (final deterministic tie-break).
//!
//! The id-first tie-break makes the order independent of how the relations
//! happen to be laid out. The side tie-break changes neither the join
//! cardinality nor the sampling distribution, only which rectangle plays
//! "query" at coincident start coordinates; runs that compare sampled bytes
//! across configurations must pin it.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Relation};
use crate::Id;

/// Which relation an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    R = 0,
    S = 1,
}

impl Side {
    #[inline]
    pub const fn other(self) -> Side {
        match self {
            Side::R => Side::S,
            Side::S => Side::R,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Side::R => "R",
            Side::S => "S",
        }
    }

    /// Index into per-side arrays.
    #[inline]
    pub const fn idx(self) -> usize {
        self as usize
    }
}

/// Event kind; the discriminants make ascending order put ends first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventKind {
    End = 0,
    Start = 1,
}

/// Preference when events still tie after coordinate, kind, and id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SideTieBreak {
    #[default]
    RBeforeS,
    SBeforeR,
}

impl SideTieBreak {
    #[inline]
    fn first(self) -> Side {
        match self {
            Self::RBeforeS => Side::R,
            Self::SBeforeR => Side::S,
        }
    }
}

/// One sweep event tied to a specific rectangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Event {
    /// Coordinate on the sweep axis.
    pub x: f64,
    pub kind: EventKind,
    pub side: Side,
    /// Stable object id (used in the total order).
    pub id: Id,
    /// Position of the rectangle inside its relation.
    pub index: u32,
}

/// The fixed total order over events.
///
/// Coordinates are compared with `total_cmp`; NaN never occurs because the
/// dataset is validated before events are built.
#[inline]
pub fn event_order(a: &Event, b: &Event, tie: SideTieBreak) -> Ordering {
    a.x.total_cmp(&b.x)
        .then_with(|| a.kind.cmp(&b.kind))
        .then_with(|| a.id.cmp(&b.id))
        .then_with(|| {
            if a.side == b.side {
                Ordering::Equal
            } else if a.side == tie.first() {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        })
        .then_with(|| a.index.cmp(&b.index))
}

/// Appends both events for every rectangle of `rel`.
///
/// Rectangles that are empty on the sweep axis cannot intersect anything
/// under half-open semantics and are skipped.
pub fn append_relation_events(rel: &Relation, side: Side, axis: usize, events: &mut Vec<Event>) {
    events.reserve(rel.len() * 2);
    for (i, rect) in rel.rects.iter().enumerate() {
        let start = rect.lo[axis];
        let end = rect.hi[axis];
        if !(start < end) {
            continue;
        }
        let id = rel.id(i);
        let index = i as u32;
        events.push(Event {
            x: start,
            kind: EventKind::Start,
            side,
            id,
            index,
        });
        events.push(Event {
            x: end,
            kind: EventKind::End,
            side,
            id,
            index,
        });
    }
}

/// Builds the sorted event list for a dataset.
pub fn build_sweep_events(ds: &Dataset, axis: usize, tie: SideTieBreak) -> Vec<Event> {
    let mut events = Vec::with_capacity(ds.total_len() * 2);
    append_relation_events(&ds.r, Side::R, axis, &mut events);
    append_relation_events(&ds.s, Side::S, axis, &mut events);
    events.sort_by(|a, b| event_order(a, b, tie));
    events
}
