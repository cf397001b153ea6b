//! The three join-sampling frameworks and their shared runner contract.
//!
//! # Module map
//! - `contract`: the `Reset -> Build -> Count -> Sample` protocol every
//!   framework implements, plus result containers and the run driver.
//! - `plan`: assignment of output slots to (event, pattern) buckets.
//! - `two_pass`: Framework II — weights sweep, plan, sampling sweep.
//! - `enum_sample`: Framework I — materialize once, index uniformly.
//! - `adaptive`: Framework III — budgeted caches and prefetch over the
//!   two-pass engine.
//!
//! Dispatch across frameworks is static: [`Sampler`] is a closed enum, not a
//! registry.

pub mod adaptive;
pub mod contract;
pub mod enum_sample;
pub mod plan;
pub mod two_pass;

pub use adaptive::AdaptiveSampler;
pub use contract::{
    run_once, CountResult, JoinEnumerator, JoinSampler, RunReport, SampleSet, Sampler,
};
pub use enum_sample::{EnumSampler, VectorEnumerator};
pub use plan::{build_slot_plan, SlotPlan};
pub use two_pass::TwoPassSampler;

use crate::dataset::Dataset;
use crate::error::SampleError;
use crate::rng::{derive_seed, Rng};
use crate::sweep::events::{EventKind, Side};
use crate::sweep::SweepContext;
use crate::PairId;

/// Builds the output pair for a query on `q_side` joined with an
/// opposite-side partner, keeping `R`,`S` order.
#[inline]
pub(crate) fn pair_for(ds: &Dataset, q_side: Side, q_index: u32, other_handle: u32) -> PairId {
    match q_side {
        Side::R => PairId::new(
            ds.r.id(q_index as usize),
            ds.s.id(other_handle as usize),
        ),
        Side::S => PairId::new(
            ds.r.id(other_handle as usize),
            ds.s.id(q_index as usize),
        ),
    }
}

/// Labeled sub-seed salts for the per-event streams of the sampling sweep.
pub(crate) const SALT_PATTERN_A: u64 = 1;
pub(crate) const SALT_PATTERN_B: u64 = 2;

/// Second sweep: fills planned slots by conditional range sampling.
///
/// For every start event `sid`, the first `consumed_*[sid]` slots of each
/// pattern list are assumed already filled (Framework III's caches and
/// prefetch prefixes); `None` means nothing was consumed. Every event
/// derives its own A/B streams from `(seed_sweep, sid)`, so the draws for
/// one event never depend on how many slots any other event owns.
pub(crate) fn fill_sweep(
    ctx: &mut SweepContext,
    ds: &Dataset,
    plan: &SlotPlan,
    consumed_a: Option<&[u32]>,
    consumed_b: Option<&[u32]>,
    seed_sweep: u64,
    pairs: &mut [PairId],
) -> Result<(), SampleError> {
    ctx.reset_active();

    let mut sampled: Vec<u32> = Vec::new();

    for pos in 0..ctx.events().len() {
        let ev = ctx.events()[pos];
        if ev.kind == EventKind::End {
            ctx.erase_active(ev.side, ev.index);
            continue;
        }

        let sid = ctx.start_id_at(pos);
        let sid_u = sid as usize;

        let skip_a = consumed_a.map_or(0, |c| c[sid_u]);
        let skip_b = consumed_b.map_or(0, |c| c[sid_u]);
        let begin_a = plan.offset_a[sid_u] + skip_a;
        let end_a = plan.offset_a[sid_u + 1];
        let begin_b = plan.offset_b[sid_u] + skip_b;
        let end_b = plan.offset_b[sid_u + 1];
        let k_a = end_a - begin_a;
        let k_b = end_b - begin_b;

        if k_a > 0 || k_b > 0 {
            let q_ylo = ctx.ylo_rank(ev.side, ev.index);
            let q_yhi = ctx.yhi_lb_rank(ev.side, ev.index);
            let ev_seed = derive_seed(seed_sweep, u64::from(sid));

            if k_a > 0 {
                let mut rng_a = Rng::new(derive_seed(ev_seed, SALT_PATTERN_A));
                let other = ctx.active(ev.side.other());
                other
                    .sample_a(q_ylo, k_a, &mut rng_a, &mut sampled)
                    .map_err(|_| SampleError::EmptyQuery { start_id: sid })?;
                if sampled.len() != k_a as usize {
                    return Err(SampleError::LengthMismatch {
                        start_id: sid,
                        expected: k_a,
                        got: sampled.len(),
                    });
                }
                for (i, &other_handle) in sampled.iter().enumerate() {
                    let slot = plan.slots_a[(begin_a as usize) + i];
                    pairs[slot as usize] = pair_for(ds, ev.side, ev.index, other_handle);
                }
            }

            if k_b > 0 {
                let mut rng_b = Rng::new(derive_seed(ev_seed, SALT_PATTERN_B));
                let other = ctx.active(ev.side.other());
                other
                    .sample_b(q_ylo, q_yhi, k_b, &mut rng_b, &mut sampled)
                    .map_err(|_| SampleError::EmptyQuery { start_id: sid })?;
                if sampled.len() != k_b as usize {
                    return Err(SampleError::LengthMismatch {
                        start_id: sid,
                        expected: k_b,
                        got: sampled.len(),
                    });
                }
                for (i, &other_handle) in sampled.iter().enumerate() {
                    let slot = plan.slots_b[(begin_b as usize) + i];
                    pairs[slot as usize] = pair_for(ds, ev.side, ev.index, other_handle);
                }
            }
        }

        // Matches pass 1: the query becomes active only after its own
        // partners were drawn.
        ctx.insert_active(ev.side, ev.index);
    }

    ctx.reset_active();
    Ok(())
}
