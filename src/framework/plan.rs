//! Slot planning: assigning output positions to (event, pattern) buckets.
//!
//! Given per-event weights, each of the `t` output slots independently draws
//! an event from the distribution proportional to `w_total` (alias table)
//! and then a pattern letter conditional on that event's `w_a : w_b` split.
//! The plan lays the slot indices out contiguously per event and pattern so
//! the sampling sweep can serve each event with one batched draw per
//! pattern. Total slot count across all lists is exactly `t`, each slot
//! appearing once.

use crate::alias::AliasTable;
use crate::error::SampleError;
use crate::rng::Rng;

/// Immutable slot layout for one sampling invocation.
///
/// `offset_*` have length `E + 1`; the slots of event `sid` for pattern A
/// are `slots_a[offset_a[sid]..offset_a[sid + 1]]`, and likewise for B.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlotPlan {
    pub offset_a: Vec<u32>,
    pub offset_b: Vec<u32>,
    pub slots_a: Vec<u32>,
    pub slots_b: Vec<u32>,
}

impl SlotPlan {
    #[inline]
    pub fn count_a(&self, sid: u32) -> u32 {
        self.offset_a[sid as usize + 1] - self.offset_a[sid as usize]
    }

    #[inline]
    pub fn count_b(&self, sid: u32) -> u32 {
        self.offset_b[sid as usize + 1] - self.offset_b[sid as usize]
    }

    #[inline]
    pub fn slots_a(&self, sid: u32) -> &[u32] {
        &self.slots_a[self.offset_a[sid as usize] as usize..self.offset_a[sid as usize + 1] as usize]
    }

    #[inline]
    pub fn slots_b(&self, sid: u32) -> &[u32] {
        &self.slots_b[self.offset_b[sid as usize] as usize..self.offset_b[sid as usize + 1] as usize]
    }

    /// Total number of planned slots (equals `t`).
    #[inline]
    pub fn total_slots(&self) -> usize {
        self.slots_a.len() + self.slots_b.len()
    }
}

/// Builds the slot plan for `t` output positions.
///
/// Preconditions: the weight slices share one length `E > 0`,
/// `w_total[e] == w_a[e] + w_b[e]`, and the total weight is positive (the
/// caller short-circuits empty joins).
pub fn build_slot_plan(
    t: u32,
    rng: &mut Rng,
    w_total: &[u64],
    w_a: &[u64],
    w_b: &[u64],
) -> Result<SlotPlan, SampleError> {
    let num_events = w_total.len();
    debug_assert!(num_events > 0);
    debug_assert_eq!(num_events, w_a.len());
    debug_assert_eq!(num_events, w_b.len());

    let alias = AliasTable::from_weights_u64(w_total).map_err(SampleError::BadWeight)?;

    // First pass: per-slot assignment and per-event counts.
    let mut event_of_slot: Vec<u32> = vec![0; t as usize];
    let mut is_b: Vec<bool> = vec![false; t as usize];
    let mut cnt_a: Vec<u32> = vec![0; num_events];
    let mut cnt_b: Vec<u32> = vec![0; num_events];

    for slot in 0..t as usize {
        let eid = alias.sample(rng);
        let wa = w_a[eid];
        let wb = w_b[eid];
        debug_assert_eq!(wa + wb, w_total[eid]);

        // Pattern conditional on the event; no division when one side is
        // empty.
        let b = if wa == 0 {
            true
        } else if wb == 0 {
            false
        } else {
            rng.uniform_u64(wa + wb) >= wa
        };

        event_of_slot[slot] = eid as u32;
        is_b[slot] = b;
        if b {
            cnt_b[eid] += 1;
        } else {
            cnt_a[eid] += 1;
        }
    }

    // Prefix sums into offsets.
    let mut plan = SlotPlan {
        offset_a: vec![0u32; num_events + 1],
        offset_b: vec![0u32; num_events + 1],
        slots_a: Vec::new(),
        slots_b: Vec::new(),
    };
    for e in 0..num_events {
        plan.offset_a[e + 1] = plan.offset_a[e] + cnt_a[e];
        plan.offset_b[e + 1] = plan.offset_b[e] + cnt_b[e];
    }
    let total_a = plan.offset_a[num_events];
    let total_b = plan.offset_b[num_events];
    debug_assert_eq!(total_a + total_b, t);

    plan.slots_a = vec![0u32; total_a as usize];
    plan.slots_b = vec![0u32; total_b as usize];

    // Second pass: stable fill into the per-event ranges.
    let mut cur_a = plan.offset_a.clone();
    let mut cur_b = plan.offset_b.clone();
    for slot in 0..t as usize {
        let eid = event_of_slot[slot] as usize;
        if is_b[slot] {
            plan.slots_b[cur_b[eid] as usize] = slot as u32;
            cur_b[eid] += 1;
        } else {
            plan.slots_a[cur_a[eid] as usize] = slot as u32;
            cur_a[eid] += 1;
        }
    }

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_for(t: u32, seed: u64, w_a: &[u64], w_b: &[u64]) -> SlotPlan {
        let w_total: Vec<u64> = w_a.iter().zip(w_b).map(|(&a, &b)| a + b).collect();
        let mut rng = Rng::new(seed);
        build_slot_plan(t, &mut rng, &w_total, w_a, w_b).unwrap()
    }

    #[test]
    fn every_slot_planned_exactly_once() {
        let plan = plan_for(500, 3, &[4, 0, 9, 1], &[0, 7, 2, 0]);
        assert_eq!(plan.total_slots(), 500);

        let mut seen = vec![false; 500];
        for &slot in plan.slots_a.iter().chain(&plan.slots_b) {
            assert!(!seen[slot as usize], "slot {slot} planned twice");
            seen[slot as usize] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn zero_weight_events_get_no_slots() {
        let plan = plan_for(300, 11, &[5, 0, 0], &[0, 0, 3]);
        assert_eq!(plan.count_a(1), 0);
        assert_eq!(plan.count_b(1), 0);
        // Events with only one pattern get slots only for that pattern.
        assert_eq!(plan.count_b(0), 0);
        assert_eq!(plan.count_a(2), 0);
        assert!(plan.count_a(0) > 0);
        assert!(plan.count_b(2) > 0);
    }

    #[test]
    fn plan_is_reproducible_per_seed() {
        let a = plan_for(256, 42, &[1, 2, 3], &[3, 2, 1]);
        let b = plan_for(256, 42, &[1, 2, 3], &[3, 2, 1]);
        assert_eq!(a, b);

        let c = plan_for(256, 43, &[1, 2, 3], &[3, 2, 1]);
        assert_ne!(a, c);
    }

    #[test]
    fn slot_shares_track_weights() {
        let w_a = [900u64, 0];
        let w_b = [0u64, 100];
        let plan = plan_for(10_000, 7, &w_a, &w_b);
        let f0 = plan.count_a(0) as f64 / 10_000.0;
        assert!((f0 - 0.9).abs() < 0.03, "event 0 share {f0}");
    }

    #[test]
    fn zero_slots_plan_is_empty() {
        let plan = plan_for(0, 1, &[1, 1], &[0, 0]);
        assert_eq!(plan.total_slots(), 0);
        assert_eq!(plan.offset_a, vec![0, 0, 0]);
    }
}
