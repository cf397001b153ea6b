//! Alias table (Vose's method) for O(1) draws from a discrete distribution.
//!
//! Build is O(n); each draw costs one bounded integer and one float from the
//! stream. Weights must be finite and non-negative; an all-zero weight
//! vector falls back to the uniform distribution over indices. The table
//! stores per-bucket thresholds, not the normalized probabilities — callers
//! that need the mass of an index must keep their original weights.
//!
//! References: Walker (1974); Vose (1991).

use std::fmt;

use crate::rng::Rng;

/// Rejected alias-table input.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum WeightError {
    /// Negative, NaN, or infinite weight.
    Invalid { index: usize },
    /// More weights than the u32 alias index space.
    TooMany { len: usize },
}

impl fmt::Display for WeightError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { index } => {
                write!(f, "weight[{index}] must be finite and >= 0")
            }
            Self::TooMany { len } => {
                write!(f, "{len} weights exceed u32 alias index space")
            }
        }
    }
}

impl std::error::Error for WeightError {}

/// Precomputed alias table over `n` weights.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    prob: Vec<f64>,
    alias: Vec<u32>,
    total_weight: f64,
    uniform_fallback: bool,
}

impl AliasTable {
    /// Builds from integer weights.
    pub fn from_weights_u64(weights: &[u64]) -> Result<Self, WeightError> {
        if weights.len() > u32::MAX as usize {
            return Err(WeightError::TooMany {
                len: weights.len(),
            });
        }
        let sum: u128 = weights.iter().map(|&w| w as u128).sum();
        if sum == 0 {
            return Ok(Self::uniform(weights.len()));
        }
        let sum_f = sum as f64;
        let scaled = weights
            .iter()
            .map(|&w| (w as f64) * (weights.len() as f64) / sum_f);
        Ok(Self::build_scaled(scaled.collect(), sum_f))
    }

    /// Builds from float weights; rejects NaN/Inf/negative entries.
    pub fn from_weights_f64(weights: &[f64]) -> Result<Self, WeightError> {
        if weights.len() > u32::MAX as usize {
            return Err(WeightError::TooMany {
                len: weights.len(),
            });
        }
        let mut sum = 0.0f64;
        for (index, &w) in weights.iter().enumerate() {
            if !w.is_finite() || w < 0.0 {
                return Err(WeightError::Invalid { index });
            }
            sum += w;
        }
        if !(sum > 0.0) {
            return Ok(Self::uniform(weights.len()));
        }
        let n = weights.len() as f64;
        let scaled = weights.iter().map(|&w| w * n / sum);
        Ok(Self::build_scaled(scaled.collect(), sum))
    }

    fn uniform(n: usize) -> Self {
        Self {
            prob: vec![1.0; n],
            alias: (0..n as u32).collect(),
            total_weight: 0.0,
            uniform_fallback: true,
        }
    }

    /// Core Vose construction over weights scaled to average 1.
    fn build_scaled(mut scaled: Vec<f64>, total_weight: f64) -> Self {
        let n = scaled.len();
        let mut prob = vec![1.0f64; n];
        let mut alias: Vec<u32> = (0..n as u32).collect();

        let mut small: Vec<u32> = Vec::with_capacity(n);
        let mut large: Vec<u32> = Vec::with_capacity(n);
        for (i, &s) in scaled.iter().enumerate() {
            if s < 1.0 {
                small.push(i as u32);
            } else {
                large.push(i as u32);
            }
        }

        while let (Some(s), Some(l)) = (small.pop(), large.pop()) {
            prob[s as usize] = scaled[s as usize]; // in (0,1)
            alias[s as usize] = l;

            // Reduce l by the deficit of s.
            scaled[l as usize] = (scaled[l as usize] + scaled[s as usize]) - 1.0;
            if scaled[l as usize] < 1.0 {
                small.push(l);
            } else {
                large.push(l);
            }
        }

        // Leftovers absorb rounding; they keep probability 1.
        for i in large.into_iter().chain(small) {
            prob[i as usize] = 1.0;
            alias[i as usize] = i;
        }

        for i in 0..n {
            prob[i] = prob[i].clamp(0.0, 1.0);
            if alias[i] as usize >= n {
                alias[i] = i as u32;
            }
        }

        Self {
            prob,
            alias,
            total_weight,
            uniform_fallback: false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.prob.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prob.is_empty()
    }

    /// Sum of the input weights (0 in the uniform fallback).
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    #[inline]
    pub fn is_uniform_fallback(&self) -> bool {
        self.uniform_fallback
    }

    /// Draws an index from the built distribution.
    ///
    /// Panics in debug builds on an empty table.
    #[inline]
    pub fn sample(&self, rng: &mut Rng) -> usize {
        debug_assert!(!self.is_empty());
        let n = self.prob.len() as u64;
        let i = rng.uniform_u64(n) as usize;
        if self.uniform_fallback {
            return i;
        }
        let u = rng.next_f64();
        if u < self.prob[i] {
            i
        } else {
            self.alias[i] as usize
        }
    }
}
