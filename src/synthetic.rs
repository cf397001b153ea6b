//! Synthetic dataset generators.
//!
//! Two generators cover the experimental needs of the frameworks:
//!
//! - [`generate_uniform`]: rectangles with uniform positions and width
//!   fractions over a square domain; join size is whatever it is.
//! - [`generate_stripes`]: the stripe construction with an exact,
//!   controllable join cardinality. `S` forms non-overlapping horizontal
//!   strips separated by gaps; every rectangle shares a common core
//!   interval on the other axis; each `R` rectangle spans exactly `d_i`
//!   consecutive strips (or sits inside a gap when `d_i = 0`). Sampling a
//!   bounded composition `{d_i}` with sum `k` pins `|J| = k` exactly.
//!
//! Generation randomness is seeded separately from sampling seeds; given
//! the same spec, a generator reproduces the same dataset.

use std::fmt;

use ahash::AHashMap;
use log::debug;
use serde::Serialize;

use crate::dataset::{Dataset, Relation};
use crate::geom::Rect;
use crate::rng::Rng;
use crate::Id;

/// Inputs shared by all generators.
#[derive(Clone, Debug)]
pub struct SyntheticSpec {
    /// Dataset tag used in logs and reports.
    pub name: String,
    pub n_r: u64,
    pub n_s: u64,

    /// Density knob; for stripes, `k = round(alpha * (n_r + n_s))` unless a
    /// `k_target` param overrides it.
    pub alpha: f64,

    /// Generation seed (independent of sampling seeds).
    pub seed: u64,

    /// Square domain `[domain_lo, domain_hi)^2`.
    pub domain_lo: f64,
    pub domain_hi: f64,

    /// Generator-specific string parameters.
    pub params: AHashMap<String, String>,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            name: "synthetic".into(),
            n_r: 1000,
            n_s: 1000,
            alpha: 0.5,
            seed: 1,
            domain_lo: 0.0,
            domain_hi: 1.0,
            params: AHashMap::new(),
        }
    }
}

impl SyntheticSpec {
    fn param_f64(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(default)
    }

    fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.parse::<u64>().ok())
    }

    fn param_bool(&self, key: &str, default: bool) -> bool {
        self.params
            .get(key)
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(default)
    }
}

/// Metadata about the produced dataset.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GenReport {
    pub generator: &'static str,
    pub dataset_name: String,
    pub n_r: u64,
    pub n_s: u64,
    /// Exact join cardinality, when the construction pins it.
    pub exact_join_size: Option<u64>,
    pub notes: String,
}

/// Generator failures (infeasible parameters, mostly).
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum GenError {
    EmptyRelation,
    BadDomain,
    BadParam { param: &'static str },
    InfeasibleTarget { k: u64, max: u128 },
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRelation => f.write_str("n_r and n_s must be > 0"),
            Self::BadDomain => f.write_str("domain_hi must be > domain_lo"),
            Self::BadParam { param } => write!(f, "invalid parameter '{param}'"),
            Self::InfeasibleTarget { k, max } => {
                write!(f, "target join size {k} exceeds n_r*n_s = {max}")
            }
        }
    }
}

impl std::error::Error for GenError {}

fn shuffle_relation(rel: &mut Relation, rng: &mut Rng) {
    rel.ensure_ids();
    // Fisher-Yates over (rect, id) together so ids stay stable.
    let n = rel.rects.len();
    for i in (1..n).rev() {
        let j = rng.uniform_u64(i as u64 + 1) as usize;
        rel.rects.swap(i, j);
        rel.ids.swap(i, j);
    }
}

// --------------------------
// Uniform generator
// --------------------------

/// Uniformly placed rectangles with width fractions in
/// `[w_min, w_max]` of the domain length (params, defaults 0.005 / 0.02).
pub fn generate_uniform(spec: &SyntheticSpec) -> Result<(Dataset, GenReport), GenError> {
    if spec.n_r == 0 || spec.n_s == 0 {
        return Err(GenError::EmptyRelation);
    }
    if !(spec.domain_hi > spec.domain_lo) {
        return Err(GenError::BadDomain);
    }
    let length = spec.domain_hi - spec.domain_lo;

    let w_min = spec.param_f64("w_min", 0.005);
    let w_max = spec.param_f64("w_max", 0.02);
    if !(w_min > 0.0 && w_max >= w_min && w_max < 1.0) {
        return Err(GenError::BadParam { param: "w_min/w_max" });
    }

    let gen_relation = |name: &str, n: u64, salt: u64| -> Relation {
        let mut rel = Relation::new(name);
        rel.rects.reserve(n as usize);
        rel.ids.reserve(n as usize);
        let mut rng = Rng::new(spec.seed ^ salt);
        for i in 0..n {
            let mut lo = [0.0f64; 2];
            let mut hi = [0.0f64; 2];
            for axis in 0..2 {
                let w = rng.uniform_f64(w_min, w_max) * length;
                let start = rng.uniform_f64(spec.domain_lo, spec.domain_hi - w);
                lo[axis] = start;
                hi[axis] = start + w;
            }
            rel.rects.push(Rect::new(lo, hi));
            rel.ids.push(Id(i as u32));
        }
        rel
    };

    let r = gen_relation("R", spec.n_r, 0xA1B2_C3D4);
    let s = gen_relation("S", spec.n_s, 0xC3D4_E5F6);

    let ds = Dataset::new(spec.name.clone(), r, s);
    let report = GenReport {
        generator: "uniform",
        dataset_name: spec.name.clone(),
        n_r: spec.n_r,
        n_s: spec.n_s,
        exact_join_size: None,
        notes: format!("w_min={w_min}, w_max={w_max}"),
    };
    Ok((ds, report))
}

// --------------------------
// Stripe generator (exact |J| control)
// --------------------------

/// Samples `d_0..d_{n_r-1}` with `0 <= d_i <= n_s` and sum exactly `k`,
/// each `d_i` uniform over its feasible interval given the remainder.
fn bounded_composition(k: u64, n_r: u64, n_s: u64, rng: &mut Rng) -> Vec<u32> {
    let mut degrees = vec![0u32; n_r as usize];
    let mut remaining = k;
    for i in 0..n_r {
        let left = n_r - i - 1;
        let max_future = u128::from(left) * u128::from(n_s);
        let low = if u128::from(remaining) > max_future {
            (u128::from(remaining) - max_future) as u64
        } else {
            0
        };
        let high = remaining.min(n_s);
        debug_assert!(low <= high);
        let d = low + rng.uniform_u64(high - low + 1);
        degrees[i as usize] = d as u32;
        remaining -= d;
    }
    debug_assert_eq!(remaining, 0);
    degrees
}

/// Stripe-controlled generator: produces a dataset whose join cardinality
/// is exactly `k` by construction.
///
/// Parameters (via `spec.params`): `core_lo`/`core_hi` fractions of the
/// domain for the shared x-core (defaults 0.45/0.55), `gap_factor` share of
/// the domain devoted to gaps (default 0.1), `delta_factor` safety margin
/// (default 0.25), `k_target` exact override for `k`, `shuffle_strips`
/// (default true), `shuffle_r` (default false).
pub fn generate_stripes(spec: &SyntheticSpec) -> Result<(Dataset, GenReport), GenError> {
    if spec.n_r == 0 || spec.n_s == 0 {
        return Err(GenError::EmptyRelation);
    }
    if !(spec.domain_hi > spec.domain_lo) {
        return Err(GenError::BadDomain);
    }
    let dom_lo = spec.domain_lo;
    let dom_hi = spec.domain_hi;
    let length = dom_hi - dom_lo;

    let core_lo_frac = spec.param_f64("core_lo", 0.45);
    let core_hi_frac = spec.param_f64("core_hi", 0.55);
    if !(core_lo_frac >= 0.0 && core_hi_frac <= 1.0 && core_lo_frac < core_hi_frac) {
        return Err(GenError::BadParam { param: "core_lo/core_hi" });
    }
    let core_lo = dom_lo + core_lo_frac * length;
    let core_hi = dom_lo + core_hi_frac * length;

    let gap_factor = spec.param_f64("gap_factor", 0.1);
    if !(gap_factor > 0.0 && gap_factor < 1.0) {
        return Err(GenError::BadParam { param: "gap_factor" });
    }
    // n_s strips of height h separated by n_s + 1 gaps of height g.
    let g = (gap_factor * length) / (spec.n_s + 1) as f64;
    let h = (length - (spec.n_s + 1) as f64 * g) / spec.n_s as f64;
    if !(g > 0.0 && h > 0.0) {
        return Err(GenError::BadParam { param: "gap_factor" });
    }

    let delta_factor = spec.param_f64("delta_factor", 0.25);
    if !(delta_factor > 0.0 && delta_factor < 0.5) {
        return Err(GenError::BadParam { param: "delta_factor" });
    }
    let delta = g.min(h) * delta_factor;

    let shuffle_strips = spec.param_bool("shuffle_strips", true);
    let shuffle_r = spec.param_bool("shuffle_r", false);

    // Target join size.
    let k = match spec.param_u64("k_target") {
        Some(k) => k,
        None => {
            let v = spec.alpha * (spec.n_r + spec.n_s) as f64;
            if v > 0.0 {
                v.round() as u64
            } else {
                0
            }
        }
    };
    let max_k = u128::from(spec.n_r) * u128::from(spec.n_s);
    if u128::from(k) > max_k {
        return Err(GenError::InfeasibleTarget { k, max: max_k });
    }

    let mut rng = Rng::new(spec.seed);
    let degrees = bounded_composition(k, spec.n_r, spec.n_s, &mut rng);

    // Strip positions on the y axis.
    let strip_lo: Vec<f64> = (0..spec.n_s)
        .map(|j| dom_lo + g + j as f64 * (h + g))
        .collect();
    let strip_hi: Vec<f64> = strip_lo.iter().map(|&y| y + h).collect();

    // Every box spans the shared core on x, so x overlap always holds and
    // the y construction alone decides intersection.
    let core_interval = |rng: &mut Rng| -> (f64, f64) {
        let lo = rng.uniform_f64(dom_lo, core_lo);
        let hi = rng.uniform_f64(core_hi, dom_hi);
        (lo, hi)
    };

    let mut s = Relation::new("S");
    s.rects.reserve(spec.n_s as usize);
    s.ids.reserve(spec.n_s as usize);
    for j in 0..spec.n_s as usize {
        let (x0, x1) = core_interval(&mut rng);
        s.rects
            .push(Rect::from_bounds(x0, x1, strip_lo[j], strip_hi[j]));
        s.ids.push(Id(j as u32));
    }
    if shuffle_strips {
        shuffle_relation(&mut s, &mut rng);
    }

    let mut r = Relation::new("R");
    r.rects.reserve(spec.n_r as usize);
    r.ids.reserve(spec.n_r as usize);
    for (i, &d) in degrees.iter().enumerate() {
        let (x0, x1) = core_interval(&mut rng);
        let (y0, y1) = if d == 0 {
            // A degree-0 box sits strictly inside a random gap.
            let u = rng.uniform_u64(spec.n_s + 1);
            let (gap_lo, gap_hi) = if u == 0 {
                (dom_lo, dom_lo + g)
            } else if u == spec.n_s {
                (dom_hi - g, dom_hi)
            } else {
                (strip_hi[(u - 1) as usize], strip_lo[u as usize])
            };
            let y0 = rng.uniform_f64(gap_lo + delta, gap_hi - 2.0 * delta);
            (y0, y0 + delta)
        } else {
            // Span exactly d consecutive strips, pulled in by delta so the
            // box clears the neighboring gaps.
            let start = rng.uniform_u64(spec.n_s - u64::from(d) + 1);
            let end = start + u64::from(d) - 1;
            (
                strip_lo[start as usize] + delta,
                strip_hi[end as usize] - delta,
            )
        };
        r.rects.push(Rect::from_bounds(x0, x1, y0, y1));
        r.ids.push(Id(i as u32));
    }
    if shuffle_r {
        shuffle_relation(&mut r, &mut rng);
    }

    let ds = Dataset::new(spec.name.clone(), r, s);
    debug!(
        "stripe dataset '{}': n_r={} n_s={} k={k} (g={g:.6}, h={h:.6}, delta={delta:.6})",
        spec.name, spec.n_r, spec.n_s
    );

    let report = GenReport {
        generator: "stripes",
        dataset_name: spec.name.clone(),
        n_r: spec.n_r,
        n_s: spec.n_s,
        exact_join_size: Some(k),
        notes: format!(
            "core=[{core_lo_frac},{core_hi_frac}], g={g:.6}, h={h:.6}, delta={delta:.6}, \
             shuffle_strips={shuffle_strips}, shuffle_r={shuffle_r}"
        ),
    };
    Ok((ds, report))
}
