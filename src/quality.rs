//! Statistical diagnostics for sampling quality on small datasets.
//!
//! Compares sampled pairs against an exact join universe (from the oracle)
//! with a chi-square goodness-of-fit test for the uniform discrete
//! distribution. The p-value uses the regularized upper incomplete gamma
//! function, computed Numerical-Recipes style (series below `a + 1`,
//! continued fraction above), so no external math crate is needed.
//!
//! These are screening tests for experiment harnesses and integration
//! tests; rigorous inference needs larger samples than they are usually
//! fed.

use std::fmt;

use ahash::AHashMap;

use crate::PairId;

/// Regularized upper incomplete gamma `Q(a, x) = Γ(a, x) / Γ(a)`.
///
/// Chi-square p-values are `Q(df/2, stat/2)`. Returns NaN outside the
/// domain `a > 0, x >= 0`.
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if !(a > 0.0) || x < 0.0 || !a.is_finite() || !x.is_finite() {
        return f64::NAN;
    }
    if x == 0.0 {
        return 1.0;
    }

    const ITMAX: usize = 200;
    const EPS: f64 = 3.0e-10;
    const FPMIN: f64 = 1.0e-300;

    let gln = ln_gamma(a);

    if x < a + 1.0 {
        // Series for P(a, x); Q = 1 - P.
        let mut ap = a;
        let mut del = 1.0 / a;
        let mut sum = del;
        for _ in 0..ITMAX {
            ap += 1.0;
            del *= x / ap;
            sum += del;
            if del.abs() < sum.abs() * EPS {
                break;
            }
        }
        let p = sum * (-x + a * x.ln() - gln).exp();
        (1.0 - p).clamp(0.0, 1.0)
    } else {
        // Continued fraction for Q(a, x).
        let mut b = x + 1.0 - a;
        let mut c = 1.0 / FPMIN;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..=ITMAX {
            let an = -(i as f64) * (i as f64 - a);
            b += 2.0;
            d = an * d + b;
            if d.abs() < FPMIN {
                d = FPMIN;
            }
            c = b + an / c;
            if c.abs() < FPMIN {
                c = FPMIN;
            }
            d = 1.0 / d;
            let del = d * c;
            h *= del;
            if (del - 1.0).abs() < EPS {
                break;
            }
        }
        ((-x + a * x.ln() - gln).exp() * h).clamp(0.0, 1.0)
    }
}

/// Lanczos log-gamma (g = 7, n = 9), accurate to ~1e-13 for positive
/// arguments.
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    debug_assert!(x > 0.0);
    let mut sum = 0.999_999_999_999_809_9;
    for (i, &c) in COEFFS.iter().enumerate() {
        sum += c / (x + i as f64);
    }
    let t = x + 6.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x - 0.5) * t.ln() - t + sum.ln()
}

/// Result of a chi-square goodness-of-fit test against uniform.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub degrees_of_freedom: u64,
    pub p_value: f64,
}

/// Chi-square test of observed cell counts against the uniform
/// distribution over the cells. Needs at least two cells and a non-empty
/// sample.
pub fn chi_square_uniform(observed: &[u64]) -> Option<ChiSquare> {
    let cells = observed.len();
    if cells < 2 {
        return None;
    }
    let total: u64 = observed.iter().sum();
    if total == 0 {
        return None;
    }
    let expected = total as f64 / cells as f64;
    let statistic: f64 = observed
        .iter()
        .map(|&o| {
            let d = o as f64 - expected;
            d * d / expected
        })
        .sum();
    let df = (cells - 1) as u64;
    let p_value = gamma_q(df as f64 / 2.0, statistic / 2.0);
    Some(ChiSquare {
        statistic,
        degrees_of_freedom: df,
        p_value,
    })
}

/// Sample-vs-universe evaluation failures.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum QualityError {
    /// A sampled pair does not belong to the join universe.
    ForeignPair { pair: PairId },
    /// The universe or sample is too small to test.
    NotTestable,
}

impl fmt::Display for QualityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignPair { pair } => {
                write!(f, "sampled pair {pair} is not in the join universe")
            }
            Self::NotTestable => f.write_str("sample or universe too small for a chi-square test"),
        }
    }
}

impl std::error::Error for QualityError {}

/// Tests whether `samples` look uniform over `universe`.
///
/// Every sampled pair must be a member of the universe; membership
/// violations are reported as errors rather than folded into the
/// statistic.
pub fn evaluate_uniformity(
    samples: &[PairId],
    universe: &[PairId],
) -> Result<ChiSquare, QualityError> {
    let mut index: AHashMap<PairId, usize> = AHashMap::with_capacity(universe.len());
    for (i, &p) in universe.iter().enumerate() {
        index.insert(p, i);
    }

    let mut counts = vec![0u64; universe.len()];
    for &p in samples {
        match index.get(&p) {
            Some(&i) => counts[i] += 1,
            None => return Err(QualityError::ForeignPair { pair: p }),
        }
    }

    chi_square_uniform(&counts).ok_or(QualityError::NotTestable)
}
