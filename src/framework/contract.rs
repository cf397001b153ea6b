//! The runner contract shared by all frameworks.
//!
//! Every framework implements [`JoinSampler`]: `reset -> build -> count ->
//! sample`, plus an optional deterministic enumerator. Runners execute the
//! phases strictly in that order, record wall time per phase, and surface
//! the first error verbatim; a failed run produces no partial sample set,
//! and the remaining runs of a sweep continue.

use log::{debug, warn};
use serde::Serialize;

use crate::config::{Config, ConfigError, Method, Variant};
use crate::dataset::Dataset;
use crate::error::RunError;
use crate::framework::adaptive::AdaptiveSampler;
use crate::framework::enum_sample::{EnumSampler, VectorEnumerator};
use crate::framework::two_pass::TwoPassSampler;
use crate::phase::PhaseRecorder;
use crate::rng::{derive_seed, Rng};
use crate::sweep::{JoinStats, SweepEnumerator};
use crate::PairId;

/// A join cardinality, exact or estimated.
///
/// Every framework in this crate reports exact counts; the uncertainty
/// fields exist for estimators that share the contract.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CountResult {
    pub value: u128,
    pub exact: bool,
    pub stderr: Option<f64>,
    pub ci: Option<(f64, f64)>,
}

impl CountResult {
    pub fn exact_count(value: u64) -> Self {
        Self {
            value: u128::from(value),
            exact: true,
            stderr: None,
            ci: None,
        }
    }

    /// The value narrowed to u64 (saturating; exact counts always fit).
    pub fn value_u64(&self) -> u64 {
        u64::try_from(self.value).unwrap_or(u64::MAX)
    }
}

/// A batch of sampled join pairs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SampleSet {
    pub pairs: Vec<PairId>,
    pub with_replacement: bool,
    pub weighted: bool,
}

impl Default for SampleSet {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            with_replacement: true,
            weighted: false,
        }
    }
}

impl SampleSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Deterministic join pair stream handed out by [`JoinSampler::enumerate`].
///
/// A closed set of enumeration strategies: the report-based sweep, or a
/// previously materialized pair vector (Framework I after its count).
pub enum JoinEnumerator<'a> {
    Sweep(SweepEnumerator<'a>),
    Materialized(VectorEnumerator<'a>),
}

impl JoinEnumerator<'_> {
    /// Rewinds the stream to the first pair.
    pub fn reset(&mut self) {
        match self {
            Self::Sweep(e) => e.reset(),
            Self::Materialized(e) => e.reset(),
        }
    }

    pub fn next_pair(&mut self) -> Option<PairId> {
        match self {
            Self::Sweep(e) => e.next_pair(),
            Self::Materialized(e) => e.next_pair(),
        }
    }

    pub fn stats(&self) -> &JoinStats {
        match self {
            Self::Sweep(e) => e.stats(),
            Self::Materialized(e) => e.stats(),
        }
    }
}

impl Iterator for JoinEnumerator<'_> {
    type Item = PairId;

    fn next(&mut self) -> Option<PairId> {
        self.next_pair()
    }
}

/// The uniform framework contract.
///
/// Semantics:
/// - `reset` may be called between repeats without rebuilding the dataset
///   and must leave the instance ready for a fresh `build`.
/// - `build` may retain the dataset reference; the dataset outlives the
///   sampler (`'d`).
/// - `count` and `sample` read their knobs from `cfg.run`; `sample` must be
///   preceded by `count` within the run, but recomputes pass-1 state itself
///   if the caller skipped it.
/// - `enumerate` returns a stream positioned at the first pair.
pub trait JoinSampler<'d> {
    fn method(&self) -> Method;
    fn variant(&self) -> Variant;
    fn name(&self) -> &'static str;

    fn reset(&mut self);

    fn build(
        &mut self,
        ds: &'d Dataset,
        cfg: &Config,
        phases: &mut PhaseRecorder,
    ) -> Result<(), RunError>;

    fn count(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<CountResult, RunError>;

    fn sample(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<SampleSet, RunError>;

    fn enumerate(&mut self) -> Result<JoinEnumerator<'_>, RunError>;
}

/// The closed set of framework implementations; dispatch is static.
pub enum Sampler<'d> {
    TwoPass(TwoPassSampler<'d>),
    Enum(EnumSampler<'d>),
    Adaptive(AdaptiveSampler<'d>),
}

impl<'d> Sampler<'d> {
    /// Instantiates the framework selected by the configuration.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        if cfg.run.method != Method::Sweep {
            return Err(ConfigError::UnsupportedMethod {
                method: cfg.run.method,
            });
        }
        Ok(match cfg.run.variant {
            Variant::Sampling => Self::TwoPass(TwoPassSampler::new()),
            Variant::EnumSampling => Self::Enum(EnumSampler::new()),
            Variant::Adaptive => Self::Adaptive(AdaptiveSampler::new()),
        })
    }
}

macro_rules! delegate {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Sampler::TwoPass($inner) => $body,
            Sampler::Enum($inner) => $body,
            Sampler::Adaptive($inner) => $body,
        }
    };
}

impl<'d> JoinSampler<'d> for Sampler<'d> {
    fn method(&self) -> Method {
        delegate!(self, s => s.method())
    }

    fn variant(&self) -> Variant {
        delegate!(self, s => s.variant())
    }

    fn name(&self) -> &'static str {
        delegate!(self, s => s.name())
    }

    fn reset(&mut self) {
        delegate!(self, s => s.reset())
    }

    fn build(
        &mut self,
        ds: &'d Dataset,
        cfg: &Config,
        phases: &mut PhaseRecorder,
    ) -> Result<(), RunError> {
        delegate!(self, s => s.build(ds, cfg, phases))
    }

    fn count(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<CountResult, RunError> {
        delegate!(self, s => s.count(cfg, rng, phases))
    }

    fn sample(
        &mut self,
        cfg: &Config,
        rng: &mut Rng,
        phases: &mut PhaseRecorder,
    ) -> Result<SampleSet, RunError> {
        delegate!(self, s => s.sample(cfg, rng, phases))
    }

    fn enumerate(&mut self) -> Result<JoinEnumerator<'_>, RunError> {
        delegate!(self, s => s.enumerate())
    }
}

/// Everything one run produces, for downstream result export.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub ok: bool,
    /// First error message, trimmed to one line, when `ok` is false.
    pub error: Option<String>,

    pub method: Method,
    pub variant: Variant,
    pub sampler: String,
    pub dataset: String,

    pub seed: u64,
    pub t: u64,

    pub count: CountResult,
    pub samples: SampleSet,

    pub phases: PhaseRecorder,
}

impl RunReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }
}

fn first_line(msg: &str) -> String {
    msg.lines().next().unwrap_or("").to_owned()
}

/// Executes the `reset -> build -> count -> sample` protocol once.
///
/// Phase randomness is split up front: the count phase draws from
/// `derive_seed(seed, 1)` and the sample phase from `derive_seed(seed, 2)`,
/// so the two phases can never couple through the stream. Failures abort
/// the remaining phases; the report carries the error and the wall time up
/// to the failure.
pub fn run_once<'d, S: JoinSampler<'d>>(
    sampler: &mut S,
    ds: &'d Dataset,
    cfg: &Config,
    seed: u64,
) -> RunReport {
    let mut report = RunReport {
        ok: false,
        error: None,
        method: sampler.method(),
        variant: sampler.variant(),
        sampler: sampler.name().to_owned(),
        dataset: ds.name.clone(),
        seed,
        t: cfg.run.t,
        count: CountResult::default(),
        samples: SampleSet::default(),
        phases: PhaseRecorder::new(),
    };

    let fail = |report: &mut RunReport, err: RunError| {
        let msg = first_line(&err.to_string());
        warn!(
            "run failed: dataset={} sampler={} seed={seed}: {msg}",
            report.dataset, report.sampler
        );
        report.error = Some(msg);
    };

    if let Err(e) = cfg.validate() {
        fail(&mut report, e.into());
        return report;
    }
    if let Err(e) = ds.validate() {
        fail(&mut report, e.into());
        return report;
    }

    // Independent randomness streams per phase.
    let mut rng_count = Rng::new(derive_seed(seed, 1));
    let mut rng_sample = Rng::new(derive_seed(seed, 2));

    sampler.reset();

    if let Err(e) = report
        .phases
        .scoped("run_build", |p| sampler.build(ds, cfg, p))
    {
        fail(&mut report, e);
        return report;
    }

    match report
        .phases
        .scoped("run_count", |p| sampler.count(cfg, &mut rng_count, p))
    {
        Ok(c) => report.count = c,
        Err(e) => {
            fail(&mut report, e);
            return report;
        }
    }

    match report
        .phases
        .scoped("run_sample", |p| sampler.sample(cfg, &mut rng_sample, p))
    {
        Ok(s) => report.samples = s,
        Err(e) => {
            fail(&mut report, e);
            return report;
        }
    }

    report.ok = true;
    debug!(
        "run ok: dataset={} sampler={} seed={} |J|={} samples={}",
        report.dataset,
        report.sampler,
        seed,
        report.count.value,
        report.samples.len()
    );
    report
}
