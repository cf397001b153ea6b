//! Error types for the join frameworks.
//!
//! Errors are stage-specific to keep diagnostics precise; the runner only
//! deals in the umbrella [`RunError`]. All enums are `#[non_exhaustive]` so
//! variants can be added without breaking callers.
//!
//! There is no local recovery anywhere: a phase that fails aborts the run,
//! and sampling must not be retried under a failed count without a reset.

use std::fmt;

use crate::alias::WeightError;
use crate::config::ConfigError;
use crate::dataset::DatasetError;

/// Failures of the counting pass.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CountError {
    /// The per-event weight sum overflowed u64 (|J| >= 2^64).
    JoinTooLarge,
}

impl fmt::Display for CountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::JoinTooLarge => f.write_str("join cardinality overflowed u64"),
        }
    }
}

impl std::error::Error for CountError {}

/// Failures of slot planning and the sampling pass.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum SampleError {
    /// `t` does not fit in u32.
    TooManySlots { t: u64 },
    /// A sub-sampler was asked for draws from an empty selection: the
    /// pass-1 weights and the pass-2 active set disagree. Fatal.
    EmptyQuery { start_id: u32 },
    /// Alias construction rejected its weight input.
    BadWeight(WeightError),
    /// A sub-sampler returned the wrong number of partners. Fatal.
    LengthMismatch {
        start_id: u32,
        expected: u32,
        got: usize,
    },
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManySlots { t } => write!(f, "t={t} does not fit in u32"),
            Self::EmptyQuery { start_id } => write!(
                f,
                "empty selection for start event {start_id} (weights inconsistent with active set)"
            ),
            Self::BadWeight(e) => write!(f, "bad sampling weights: {e}"),
            Self::LengthMismatch {
                start_id,
                expected,
                got,
            } => write!(
                f,
                "sub-sampler for start event {start_id} returned {got} partners (expected {expected})"
            ),
        }
    }
}

impl std::error::Error for SampleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BadWeight(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WeightError> for SampleError {
    fn from(e: WeightError) -> Self {
        Self::BadWeight(e)
    }
}

/// Failures of join materialization.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnumerateError {
    /// The join would exceed the configured materialization cap.
    CapExceeded { cap: u64 },
}

impl fmt::Display for EnumerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapExceeded { cap } => {
                write!(f, "join size exceeds enum_cap={cap}; refusing to materialize")
            }
        }
    }
}

impl std::error::Error for EnumerateError {}

/// Umbrella error surfaced by the runner contract.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum RunError {
    Dataset(DatasetError),
    Config(ConfigError),
    Count(CountError),
    Sample(SampleError),
    Enumerate(EnumerateError),
    /// A phase was invoked before `build`.
    NotBuilt,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dataset(e) => write!(f, "invalid dataset: {e}"),
            Self::Config(e) => write!(f, "config mismatch: {e}"),
            Self::Count(e) => write!(f, "count failed: {e}"),
            Self::Sample(e) => write!(f, "sample failed: {e}"),
            Self::Enumerate(e) => write!(f, "enumerate failed: {e}"),
            Self::NotBuilt => f.write_str("build must run before this phase"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dataset(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Count(e) => Some(e),
            Self::Sample(e) => Some(e),
            Self::Enumerate(e) => Some(e),
            Self::NotBuilt => None,
        }
    }
}

impl From<DatasetError> for RunError {
    fn from(e: DatasetError) -> Self {
        Self::Dataset(e)
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<CountError> for RunError {
    fn from(e: CountError) -> Self {
        Self::Count(e)
    }
}

impl From<SampleError> for RunError {
    fn from(e: SampleError) -> Self {
        Self::Sample(e)
    }
}

impl From<EnumerateError> for RunError {
    fn from(e: EnumerateError) -> Self {
        Self::Enumerate(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_are_single_line() {
        let errors: Vec<RunError> = vec![
            CountError::JoinTooLarge.into(),
            SampleError::EmptyQuery { start_id: 3 }.into(),
            SampleError::TooManySlots { t: 1 << 40 }.into(),
            EnumerateError::CapExceeded { cap: 100 }.into(),
            RunError::NotBuilt,
        ];
        for e in errors {
            let msg = e.to_string();
            assert!(!msg.is_empty());
            assert!(!msg.contains('\n'), "multi-line message: {msg}");
        }
    }

    #[test]
    fn sources_chain() {
        use std::error::Error;
        let e: RunError = SampleError::BadWeight(WeightError::Invalid { index: 2 }).into();
        assert!(e.source().unwrap().source().is_some());
    }
}
