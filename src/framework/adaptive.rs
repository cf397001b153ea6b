//! Framework III: budgeted caching and prefetch over the two-pass engine.
//!
//! Pass 1 computes the same exact weights as Framework II and spends a
//! memory budget `B` two ways while it sweeps:
//!
//! - events with weight at most `w_small` get their full partner list
//!   reported into an append-only cache (one record per partner);
//! - for the rest, a global min-heap of scored slots allocates the
//!   remaining budget to prefetched i.i.d. partner samples, one sample per
//!   kept slot.
//!
//! The slot score is the Poisson tail probability that the event will own
//! at least `r` output slots, estimated from the weight prefix seen so far.
//! The score is monotone non-increasing in `r`, so evicting the heap
//! minimum always drops the last prefetched sample of its event and every
//! event keeps an i.i.d. *prefix* of samples. Scores steer only the budget:
//! a cached or prefetched fill has exactly the distribution the residual
//! sweep would have produced, so the output distribution is identical to
//! Framework II's — with `budget = 0` the sampled bytes are identical too.
//!
//! Sample builds the same slot plan as Framework II, serves each event from
//! its cache or prefetch prefix, and defers only the remaining slots to a
//! residual second sweep; when nothing remains, pass 2 is skipped entirely.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use log::debug;

use crate::config::{Config, Method, Variant};
use crate::dataset::Dataset;
use crate::error::{CountError, RunError, SampleError};
use crate::framework::contract::{CountResult, JoinEnumerator, JoinSampler, SampleSet};
use crate::framework::plan::build_slot_plan;
use crate::framework::{fill_sweep, pair_for, SlotPlan};
use crate::phase::PhaseRecorder;
use crate::rng::{derive_seed, Rng};
use crate::sweep::events::EventKind;
use crate::sweep::{SideTieBreak, SweepContext, SweepEnumerator};
use crate::PairId;

/// Label for the pass-1 prefetch stream family.
const SALT_PREFETCH: u64 = 0xA11C;
/// Label for the cache-fill stream family.
const SALT_CACHE: u64 = 0xCAC4E;

// --------------------------
// Poisson-tail slot scoring
// --------------------------

/// Extrapolates the total weight from the prefix seen after `i` of
/// `total_starts` start events.
#[inline]
fn estimate_total_weight(total_starts: u32, i: u32, w_sofar: f64) -> f64 {
    if total_starts == 0 || i == 0 {
        return w_sofar;
    }
    w_sofar * (f64::from(total_starts) / f64::from(i))
}

/// Rational approximation of the complementary error function
/// (Abramowitz & Stegun 7.1.26). Plenty for an advisory score.
fn erfc_approx(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc_approx(-x);
    }
    let t = 1.0 / (1.0 + 0.327_591_1 * x);
    let poly = t * (0.254_829_592
        + t * (-0.284_496_736 + t * (1.421_413_741 + t * (-1.453_152_027 + t * 1.061_405_429))));
    poly * (-x * x).exp()
}

/// `Pr[X >= r]` for `X ~ Poisson(mu)`: exact prefix sum for small `mu`,
/// normal approximation with continuity correction otherwise.
fn poisson_survival(mu: f64, r: u32) -> f64 {
    if r == 0 {
        return 1.0;
    }
    if !(mu > 0.0) || !mu.is_finite() {
        return 0.0;
    }

    if mu <= 50.0 && r <= 200 {
        let mut p = (-mu).exp();
        let mut cdf = p;
        for k in 1..r {
            p *= mu / f64::from(k);
            cdf += p;
        }
        return (1.0 - cdf).clamp(0.0, 1.0);
    }

    let sigma = mu.sqrt();
    if !(sigma > 0.0) || !sigma.is_finite() {
        return 0.0;
    }
    let z = (f64::from(r) - 0.5 - mu) / sigma;
    (0.5 * erfc_approx(z * std::f64::consts::FRAC_1_SQRT_2)).clamp(0.0, 1.0)
}

/// Value of keeping the `r`-th prefetch slot (1-based) for an event of
/// weight `w` seen `i`-th among `total_starts`, with `w_sofar` prefix
/// weight and `t` output slots. Monotone non-increasing in `r`.
fn slot_score(w: u64, total_starts: u32, i: u32, w_sofar: f64, t: u64, r: u32) -> f64 {
    if r == 0 {
        return 1.0;
    }
    if w == 0 || t == 0 {
        return 0.0;
    }
    let w_hat = estimate_total_weight(total_starts, i, w_sofar);
    if !(w_hat > 0.0) {
        return 0.0;
    }
    let mu = (t as f64) * (w as f64 / w_hat);
    poisson_survival(mu, r)
}

// --------------------------
// Prefetch heap
// --------------------------

/// One unit of sample-cache budget: a scored slot of some start event.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PrefetchSlot {
    score: f64,
    sid: u32,
}

impl Eq for PrefetchSlot {}

impl Ord for PrefetchSlot {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.sid.cmp(&other.sid))
    }
}

impl PartialOrd for PrefetchSlot {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap over slot scores; capacity is enforced by the caller.
#[derive(Debug, Default)]
struct PrefetchHeap {
    heap: BinaryHeap<Reverse<PrefetchSlot>>,
}

impl PrefetchHeap {
    fn len(&self) -> usize {
        self.heap.len()
    }

    fn min_score(&self) -> f64 {
        self.heap
            .peek()
            .map_or(f64::NEG_INFINITY, |Reverse(s)| s.score)
    }

    fn push(&mut self, slot: PrefetchSlot) {
        self.heap.push(Reverse(slot));
    }

    fn pop_min(&mut self) -> Option<PrefetchSlot> {
        self.heap.pop().map(|Reverse(s)| s)
    }
}

// --------------------------
// Driver
// --------------------------

/// Framework III driver.
pub struct AdaptiveSampler<'d> {
    ds: Option<&'d Dataset>,
    ctx: SweepContext,

    w_total: Vec<u64>,
    w_a: Vec<u64>,
    w_b: Vec<u64>,
    join_size: u64,
    weights_valid: bool,

    /// Per start event: full partner cache location, if cached.
    cached: Vec<bool>,
    cache_off: Vec<usize>,
    cache_len: Vec<usize>,
    cache_partners: Vec<u32>,

    /// Per start event: kept prefetch slot count and the generated i.i.d.
    /// sample prefix (evictions pop from the back of both).
    prefetch_keep: Vec<u32>,
    prefetch: Vec<Vec<u32>>,

    cache_valid: bool,
    budget: u64,
    budget_used: u64,
    w_small: u64,
}

impl<'d> AdaptiveSampler<'d> {
    pub fn new() -> Self {
        Self {
            ds: None,
            ctx: SweepContext::new(),
            w_total: Vec::new(),
            w_a: Vec::new(),
            w_b: Vec::new(),
            join_size: 0,
            weights_valid: false,
            cached: Vec::new(),
            cache_off: Vec::new(),
            cache_len: Vec::new(),
            cache_partners: Vec::new(),
            prefetch_keep: Vec::new(),
            prefetch: Vec::new(),
            cache_valid: false,
            budget: 0,
            budget_used: 0,
            w_small: 0,
        }
    }

    /// Budget actually consumed by the last pass 1 (records + heap slots).
    pub fn budget_used(&self) -> u64 {
        self.budget_used
    }

    fn clear_pass1_state(&mut self) {
        self.w_total.fill(0);
        self.w_a.fill(0);
        self.w_b.fill(0);
        self.cached.fill(false);
        self.cache_off.fill(0);
        self.cache_len.fill(0);
        self.cache_partners.clear();
        self.prefetch_keep.fill(0);
        for v in &mut self.prefetch {
            v.clear();
        }
        self.weights_valid = false;
        self.cache_valid = false;
        self.budget_used = 0;
    }

    /// Pass 1: weights, full caches, and budgeted prefetch in one sweep.
    fn count_pass(&mut self, cfg: &Config, rng: &mut Rng) -> Result<u64, RunError> {
        self.clear_pass1_state();

        let num_starts = self.w_total.len();
        self.budget = cfg.run.extra_u64_or("budget", cfg.run.budget);
        self.w_small = cfg.run.extra_u64_or("w_small", cfg.run.w_small);

        let t = cfg.run.t;
        let enable_prefetch = self.budget > 0 && t > 0;
        // One upstream draw seeds every per-event prefetch stream, so the
        // number of kept slots of one event cannot shift another's draws.
        let base_prefetch_seed = if enable_prefetch { rng.next_u64() } else { 0 };
        let prefetch_root = derive_seed(base_prefetch_seed, SALT_PREFETCH);

        let mut heap = PrefetchHeap::default();
        let mut mem_full: u64 = 0;

        self.ctx.reset_active();

        let mut total = 0u64;
        let mut w_sofar = 0.0f64;

        let mut pat_scratch: Vec<bool> = Vec::new();
        let mut samp_a: Vec<u32> = Vec::new();
        let mut samp_b: Vec<u32> = Vec::new();

        for pos in 0..self.ctx.events().len() {
            let ev = self.ctx.events()[pos];
            if ev.kind == EventKind::End {
                self.ctx.erase_active(ev.side, ev.index);
                continue;
            }

            let sid = self.ctx.start_id_at(pos);
            let sid_u = sid as usize;
            // 1-based position among start events, for the prefix estimate.
            let i = sid + 1;

            let q_ylo = self.ctx.ylo_rank(ev.side, ev.index);
            let q_yhi = self.ctx.yhi_lb_rank(ev.side, ev.index);

            let other = self.ctx.active(ev.side.other());
            let wa = other.count_a(q_ylo);
            let wb = other.count_b(q_ylo, q_yhi);
            let w = wa + wb;

            self.w_a[sid_u] = wa;
            self.w_b[sid_u] = wb;
            self.w_total[sid_u] = w;

            total = match total.checked_add(w) {
                Some(x) => x,
                None => {
                    self.ctx.reset_active();
                    return Err(CountError::JoinTooLarge.into());
                }
            };
            w_sofar += w as f64;

            let can_full_cache = self.w_small > 0
                && w > 0
                && w <= self.w_small
                && mem_full + w <= self.budget;

            if can_full_cache {
                let off = self.cache_partners.len();
                let other = self.ctx.active(ev.side.other());
                other.report_a(q_ylo, &mut self.cache_partners);
                other.report_b(q_ylo, q_yhi, &mut self.cache_partners);
                let len = self.cache_partners.len() - off;
                if len as u64 != w {
                    return Err(SampleError::LengthMismatch {
                        start_id: sid,
                        expected: w as u32,
                        got: len,
                    }
                    .into());
                }
                self.cached[sid_u] = true;
                self.cache_off[sid_u] = off;
                self.cache_len[sid_u] = len;
                mem_full += w;

                // Records took budget away from the sample heap. More than
                // t prefetched slots can never be consumed, so the heap
                // never needs to grow past t.
                let heap_cap = self.budget.saturating_sub(mem_full).min(t) as usize;
                while heap.len() > heap_cap {
                    if let Some(popped) = heap.pop_min() {
                        let j = popped.sid as usize;
                        if self.prefetch_keep[j] > 0 {
                            self.prefetch_keep[j] -= 1;
                            self.prefetch[j].pop();
                        }
                    }
                }
            } else if enable_prefetch && w > 0 {
                let heap_cap = self.budget.saturating_sub(mem_full).min(t) as usize;
                if heap_cap > 0 {
                    loop {
                        let r = self.prefetch_keep[sid_u] + 1;
                        let score =
                            slot_score(w, num_starts as u32, i, w_sofar, t, r);

                        if heap.len() < heap_cap {
                            heap.push(PrefetchSlot { score, sid });
                            self.prefetch_keep[sid_u] += 1;
                            continue;
                        }
                        if score > heap.min_score() {
                            heap.push(PrefetchSlot { score, sid });
                            self.prefetch_keep[sid_u] += 1;
                            if let Some(popped) = heap.pop_min() {
                                let j = popped.sid as usize;
                                if self.prefetch_keep[j] > 0 {
                                    self.prefetch_keep[j] -= 1;
                                    self.prefetch[j].pop();
                                }
                            }
                            continue;
                        }
                        // Scores are non-increasing in r; nothing further
                        // can enter the heap for this event.
                        break;
                    }

                    let keep = self.prefetch_keep[sid_u];
                    if keep > 0 {
                        // Generate the i.i.d. prefix with the same
                        // primitives pass 2 would use, on the same active
                        // snapshot.
                        let ev_seed = derive_seed(prefetch_root, u64::from(sid));
                        let mut rng_pat = Rng::new(derive_seed(ev_seed, 1));
                        let mut rng_samp = Rng::new(derive_seed(ev_seed, 2));

                        pat_scratch.clear();
                        let mut k_a = 0u32;
                        let mut k_b = 0u32;
                        for _ in 0..keep {
                            let b = if wa == 0 {
                                true
                            } else if wb == 0 {
                                false
                            } else {
                                rng_pat.uniform_u64(w) >= wa
                            };
                            pat_scratch.push(b);
                            if b {
                                k_b += 1;
                            } else {
                                k_a += 1;
                            }
                        }

                        let other = self.ctx.active(ev.side.other());
                        if k_a > 0 {
                            other
                                .sample_a(q_ylo, k_a, &mut rng_samp, &mut samp_a)
                                .map_err(|_| SampleError::EmptyQuery { start_id: sid })?;
                        } else {
                            samp_a.clear();
                        }
                        if k_b > 0 {
                            other
                                .sample_b(q_ylo, q_yhi, k_b, &mut rng_samp, &mut samp_b)
                                .map_err(|_| SampleError::EmptyQuery { start_id: sid })?;
                        } else {
                            samp_b.clear();
                        }

                        let dst = &mut self.prefetch[sid_u];
                        dst.clear();
                        dst.reserve(keep as usize);
                        let (mut ia, mut ib) = (0usize, 0usize);
                        for &b in &pat_scratch {
                            if b {
                                dst.push(samp_b[ib]);
                                ib += 1;
                            } else {
                                dst.push(samp_a[ia]);
                                ia += 1;
                            }
                        }
                    }
                }
            }

            self.ctx.insert_active(ev.side, ev.index);
        }

        self.ctx.reset_active();

        self.join_size = total;
        self.weights_valid = true;
        self.cache_valid = true;
        self.budget_used = (mem_full + heap.len() as u64).min(self.budget);
        debug!(
            "adaptive pass 1: |J| = {total}, budget used {}/{} (records {mem_full}, prefetch {})",
            self.budget_used,
            self.budget,
            heap.len()
        );
        Ok(total)
    }
}

impl Default for AdaptiveSampler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> JoinSampler<'d> for AdaptiveSampler<'d> {
    fn method(&self) -> Method {
        Method::Sweep
    }

    fn variant(&self) -> Variant {
        Variant::Adaptive
    }

    fn name(&self) -> &'static str {
        "sweep_adaptive"
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn build(
        &mut self,
        ds: &'d Dataset,
        _cfg: &Config,
        phases: &mut PhaseRecorder,
    ) -> Result<(), RunError> {
        self.reset();
        self.ds = Some(ds);
        self.ctx.build(ds, SideTieBreak::RBeforeS, phases);

        let num_starts = self.ctx.start_count();
        self.w_total = vec![0; num_starts];
        self.w_a = vec![0; num_starts];
        self.w_b = vec![0; num_starts];
        self.cached = vec![false; num_starts];
        self.cache_off = vec![0; num_starts];
        self.cache_len = vec![0; num_starts];
        self.prefetch_keep = vec![0; num_starts];
        self.prefetch = vec![Vec::new(); num_starts];
        Ok(())
    }

    fn count(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<CountResult, RunError> {
        if self.ds.is_none() || !self.ctx.built() {
            return Err(RunError::NotBuilt);
        }
        let total = phases.scoped("phase1_count_and_cache", |_| self.count_pass(cfg, rng))?;
        Ok(CountResult::exact_count(total))
    }

    fn sample(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<SampleSet, RunError> {
        let ds = self.ds.ok_or(RunError::NotBuilt)?;
        if !self.ctx.built() {
            return Err(RunError::NotBuilt);
        }
        if cfg.run.t > u64::from(u32::MAX) {
            return Err(SampleError::TooManySlots { t: cfg.run.t }.into());
        }
        let t = cfg.run.t as u32;

        let mut out = SampleSet::default();
        if t == 0 {
            return Ok(out);
        }

        if !self.weights_valid || !self.cache_valid {
            phases.scoped("phase1_count_and_cache", |_| self.count_pass(cfg, rng))?;
        }
        if self.join_size == 0 {
            return Ok(out);
        }

        // Same first two sub-seeds as the two-pass sampler: with an empty
        // cache and no prefetch the plan and the residual sweep reproduce
        // its output byte for byte.
        let seed_plan = rng.next_u64();
        let seed_sweep = rng.next_u64();
        let seed_cache = rng.next_u64();

        let num_starts = self.w_total.len();
        let mut pairs = vec![PairId::default(); t as usize];
        let mut consumed_a = vec![0u32; num_starts];
        let mut consumed_b = vec![0u32; num_starts];
        let mut residual: u64 = 0;

        let plan: SlotPlan = phases.scoped("phase2_fill", |_| -> Result<SlotPlan, RunError> {
            let mut rng_plan = Rng::new(seed_plan);
            let plan = build_slot_plan(t, &mut rng_plan, &self.w_total, &self.w_a, &self.w_b)?;

            for sid in 0..num_starts as u32 {
                let sid_u = sid as usize;
                let k_a = plan.count_a(sid);
                let k_b = plan.count_b(sid);
                if k_a + k_b == 0 {
                    continue;
                }
                let side = self.ctx.start_side(sid);
                let q_index = self.ctx.start_index(sid);

                if self.cached[sid_u] {
                    let len = self.cache_len[sid_u] as u64;
                    if len == 0 {
                        return Err(SampleError::EmptyQuery { start_id: sid }.into());
                    }
                    let off = self.cache_off[sid_u];
                    // Uniform indices into the exact partner set; the
                    // plan's pattern split collapses because the cache
                    // holds both patterns.
                    let mut rng_c = Rng::new(derive_seed(seed_cache, u64::from(sid)));
                    for &slot in plan.slots_a(sid).iter().chain(plan.slots_b(sid)) {
                        let pick = rng_c.uniform_u64(len) as usize;
                        let partner = self.cache_partners[off + pick];
                        pairs[slot as usize] = pair_for(ds, side, q_index, partner);
                    }
                    consumed_a[sid_u] = k_a;
                    consumed_b[sid_u] = k_b;
                    continue;
                }

                // Prefetched samples carry their own i.i.d. pattern draws,
                // so serving them against the plan's slot order keeps each
                // slot uniform over the event's partner set.
                let pref = &self.prefetch[sid_u];
                let s = pref.len() as u32;
                let use_a = s.min(k_a);
                for (j, &slot) in plan.slots_a(sid).iter().take(use_a as usize).enumerate() {
                    pairs[slot as usize] = pair_for(ds, side, q_index, pref[j]);
                }
                let use_b = (s - use_a).min(k_b);
                for (j, &slot) in plan.slots_b(sid).iter().take(use_b as usize).enumerate() {
                    pairs[slot as usize] =
                        pair_for(ds, side, q_index, pref[use_a as usize + j]);
                }
                consumed_a[sid_u] = use_a;
                consumed_b[sid_u] = use_b;
                residual += u64::from(k_a - use_a) + u64::from(k_b - use_b);
            }
            Ok(plan)
        })?;

        if residual > 0 {
            phases.scoped("phase3_fill_residual", |_| {
                fill_sweep(
                    &mut self.ctx,
                    ds,
                    &plan,
                    Some(&consumed_a),
                    Some(&consumed_b),
                    seed_sweep,
                    &mut pairs,
                )
            })?;
        } else {
            debug!("adaptive sample: one-pass completion, no residual sweep");
        }

        out.pairs = pairs;
        Ok(out)
    }

    fn enumerate(&mut self) -> Result<JoinEnumerator<'_>, RunError> {
        let ds = self.ds.ok_or(RunError::NotBuilt)?;
        if !self.ctx.built() {
            return Err(RunError::NotBuilt);
        }
        Ok(JoinEnumerator::Sweep(SweepEnumerator::new(
            &mut self.ctx,
            ds,
        )))
    }
}
