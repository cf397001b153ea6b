//! Run configuration: method/variant selectors and tuning knobs.
//!
//! The core consumes a validated [`Config`]; file formats and CLI parsing
//! live with the callers. Unknown knobs travel in the `extra` string map so
//! new options never break old runs.

use std::fmt;
use std::str::FromStr;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Join method selector.
///
/// Only [`Method::Sweep`] is implemented in this crate; the other selectors
/// name external comparison baselines and are rejected at sampler
/// construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    #[default]
    Sweep,
    RangeTree,
    KdTree,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sweep => "sweep",
            Self::RangeTree => "range_tree",
            Self::KdTree => "kd_tree",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "sweep" | "ours" => Ok(Self::Sweep),
            "range_tree" | "rangetree" => Ok(Self::RangeTree),
            "kd_tree" | "kdtree" | "kd" => Ok(Self::KdTree),
            _ => Err(ConfigError::UnknownMethod { input: s.into() }),
        }
    }
}

/// Framework variant selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Variant {
    /// Framework II: two-pass sweep sampling, join never materialized.
    #[default]
    Sampling,
    /// Framework I: enumerate + uniform indexing.
    EnumSampling,
    /// Framework III: budgeted caches and prefetch on top of Framework II.
    Adaptive,
}

impl Variant {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sampling => "sampling",
            Self::EnumSampling => "enum_sampling",
            Self::Adaptive => "adaptive",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        match lower.as_str() {
            "sampling" => Ok(Self::Sampling),
            "enum_sampling" | "enum+sampling" | "enumerate_sampling" => Ok(Self::EnumSampling),
            "adaptive" => Ok(Self::Adaptive),
            _ => Err(ConfigError::UnknownVariant { input: s.into() }),
        }
    }
}

/// Configuration errors.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Only the 2D core is implemented.
    UnsupportedDim { dim: i32 },
    /// `t` must fit in u32 so slot indices stay compact.
    SampleCountTooLarge { t: u64 },
    /// `repeats` must be at least 1.
    NoRepeats,
    /// `sys.threads` must be at least 1 (the core runs single-threaded).
    NoThreads,
    /// The selected method has no in-crate implementation.
    UnsupportedMethod { method: Method },
    UnknownMethod { input: String },
    UnknownVariant { input: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedDim { dim } => write!(f, "dim must be 2 (got {dim})"),
            Self::SampleCountTooLarge { t } => {
                write!(f, "t={t} does not fit in u32")
            }
            Self::NoRepeats => write!(f, "repeats must be > 0"),
            Self::NoThreads => write!(f, "sys.threads must be > 0"),
            Self::UnsupportedMethod { method } => {
                write!(f, "method '{method}' is not implemented by this crate")
            }
            Self::UnknownMethod { input } => write!(f, "unknown method '{input}'"),
            Self::UnknownVariant { input } => write!(f, "unknown variant '{input}'"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Per-run knobs shared by all frameworks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub method: Method,
    pub variant: Variant,

    /// Number of output slots to fill.
    pub t: u64,

    /// Master sampling seed; phase streams are derived from it.
    pub seed: u64,

    /// Repeats per configuration (used by sweep drivers, not the core).
    pub repeats: u64,

    /// Framework III memory budget B (cached partner records + prefetch
    /// slots).
    pub budget: u64,

    /// Framework I materialization cap; 0 means unbounded.
    pub enum_cap: u64,

    /// Framework III small-event threshold; events with weight at most this
    /// are fully cached. 0 disables full caching.
    pub w_small: u64,

    /// Emit sampled pairs to disk (interpreted by callers).
    pub write_samples: bool,

    /// Run oracle verification on small datasets (interpreted by callers).
    pub verify: bool,

    /// Forwarded knobs; unknown keys are preserved and may be ignored.
    #[serde(default, skip_serializing_if = "extra_is_empty")]
    pub extra: AHashMap<String, String>,
}

fn extra_is_empty(m: &AHashMap<String, String>) -> bool {
    m.len() == 0
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method: Method::Sweep,
            variant: Variant::Sampling,
            t: 10_000,
            seed: 1,
            repeats: 5,
            budget: 1_000_000,
            enum_cap: 0,
            w_small: 0,
            write_samples: false,
            verify: false,
            extra: AHashMap::new(),
        }
    }
}

impl RunConfig {
    /// Looks up a u64 knob in `extra`, falling back to `default` when the
    /// key is missing or unparsable.
    pub fn extra_u64_or(&self, key: &str, default: u64) -> u64 {
        self.extra
            .get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(default)
    }
}

/// Process-level knobs.
///
/// `threads` currently has no effect on the core, which is single-threaded
/// by contract; it is carried for sweep drivers that schedule whole runs.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SystemConfig {
    pub threads: i32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

/// Full configuration consumed by the core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Dimensionality of the dataset; the core implements `dim == 2`.
    pub dim: i32,
    pub run: RunConfig,
    pub sys: SystemConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dim: 2,
            run: RunConfig::default(),
            sys: SystemConfig::default(),
        }
    }
}

impl Config {
    /// Checks basic constraints. `t == 0` is allowed: sampling zero slots is
    /// a defined no-op.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim != 2 {
            return Err(ConfigError::UnsupportedDim { dim: self.dim });
        }
        if self.run.t > u64::from(u32::MAX) {
            return Err(ConfigError::SampleCountTooLarge { t: self.run.t });
        }
        if self.run.repeats == 0 {
            return Err(ConfigError::NoRepeats);
        }
        if self.sys.threads <= 0 {
            return Err(ConfigError::NoThreads);
        }
        Ok(())
    }

    /// JSON snapshot for logs and result records.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_owned())
    }
}
