//! Framework I: enumerate + sample.
//!
//! Count materializes the whole join once through the deterministic sweep
//! enumerator (Theta(|J|) memory, refused beyond `enum_cap`), and sample
//! draws `t` uniform indices into the cached vector with replacement. After
//! materialization, enumeration is an O(1)-per-step replay of the vector.

use log::debug;

use crate::config::{Config, Method, Variant};
use crate::dataset::Dataset;
use crate::error::{EnumerateError, RunError, SampleError};
use crate::framework::contract::{CountResult, JoinEnumerator, JoinSampler, SampleSet};
use crate::phase::PhaseRecorder;
use crate::rng::Rng;
use crate::sweep::{JoinStats, SideTieBreak, SweepContext, SweepEnumerator};
use crate::PairId;

/// O(1) replay of a materialized pair vector.
pub struct VectorEnumerator<'a> {
    pairs: &'a [PairId],
    pos: usize,
    stats: JoinStats,
}

impl<'a> VectorEnumerator<'a> {
    pub fn new(pairs: &'a [PairId]) -> Self {
        Self {
            pairs,
            pos: 0,
            stats: JoinStats::default(),
        }
    }

    pub fn reset(&mut self) {
        self.pos = 0;
        self.stats.reset();
    }

    pub fn next_pair(&mut self) -> Option<PairId> {
        let p = self.pairs.get(self.pos).copied()?;
        self.pos += 1;
        self.stats.output_pairs += 1;
        Some(p)
    }

    pub fn stats(&self) -> &JoinStats {
        &self.stats
    }
}

impl Iterator for VectorEnumerator<'_> {
    type Item = PairId;

    fn next(&mut self) -> Option<PairId> {
        self.next_pair()
    }
}

/// Framework I driver.
pub struct EnumSampler<'d> {
    ds: Option<&'d Dataset>,
    ctx: SweepContext,
    pairs: Vec<PairId>,
    pairs_cached: bool,
}

impl<'d> EnumSampler<'d> {
    pub fn new() -> Self {
        Self {
            ds: None,
            ctx: SweepContext::new(),
            pairs: Vec::new(),
            pairs_cached: false,
        }
    }

    /// Runs the sweep enumerator to completion, caching every pair.
    ///
    /// With `cap > 0`, refuses (and caches nothing) as soon as the join
    /// grows past the cap; a truncated materialization would bias every
    /// later draw.
    fn materialize(&mut self, ds: &'d Dataset, cap: u64) -> Result<(), EnumerateError> {
        self.pairs.clear();
        let mut en = SweepEnumerator::new(&mut self.ctx, ds);
        while let Some(p) = en.next_pair() {
            self.pairs.push(p);
            if cap > 0 && self.pairs.len() as u64 > cap {
                self.pairs.clear();
                self.pairs_cached = false;
                return Err(EnumerateError::CapExceeded { cap });
            }
        }
        self.pairs_cached = true;
        debug!("materialized join: {} pairs", self.pairs.len());
        Ok(())
    }
}

impl Default for EnumSampler<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'d> JoinSampler<'d> for EnumSampler<'d> {
    fn method(&self) -> Method {
        Method::Sweep
    }

    fn variant(&self) -> Variant {
        Variant::EnumSampling
    }

    fn name(&self) -> &'static str {
        "sweep_enum_sampling"
    }

    fn reset(&mut self) {
        self.ds = None;
        self.ctx.reset();
        self.pairs.clear();
        self.pairs_cached = false;
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
        Ok(())
    }

    fn count(
        &mut self,
        cfg: &Config,
        _rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<CountResult, RunError> {
        let ds = self.ds.ok_or(RunError::NotBuilt)?;
        if !self.ctx.built() {
            return Err(RunError::NotBuilt);
        }
        if !self.pairs_cached {
            phases.scoped("phase1_enumerate_materialize", |_| {
                self.materialize(ds, cfg.run.enum_cap)
            })?;
        }
        Ok(CountResult::exact_count(self.pairs.len() as u64))
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

        if !self.pairs_cached {
            phases.scoped("phase1_enumerate_materialize", |_| {
                self.materialize(ds, cfg.run.enum_cap)
            })?;
        }

        let universe = self.pairs.len() as u64;
        if universe == 0 {
            return Ok(out);
        }

        phases.scoped("phase2_resample", |_| {
            out.pairs.reserve(t as usize);
            for _ in 0..t {
                let idx = rng.uniform_u64(universe) as usize;
                out.pairs.push(self.pairs[idx]);
            }
        });
        Ok(out)
    }

    fn enumerate(&mut self) -> Result<JoinEnumerator<'_>, RunError> {
        let ds = self.ds.ok_or(RunError::NotBuilt)?;
        if !self.ctx.built() {
            return Err(RunError::NotBuilt);
        }
        if self.pairs_cached {
            Ok(JoinEnumerator::Materialized(VectorEnumerator::new(
                &self.pairs,
            )))
        } else {
            Ok(JoinEnumerator::Sweep(SweepEnumerator::new(
                &mut self.ctx,
                ds,
            )))
        }
    }
}
