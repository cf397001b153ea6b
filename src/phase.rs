//! Wall-clock timing for run phases.
//!
//! Phase names are part of the public observation contract: sweep
//! aggregators parse them out of run reports. A [`PhaseRecorder`] accumulates
//! nanoseconds per name; nested phases are recorded by passing the recorder
//! back into the scoped closure.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;

/// Simple monotonic stopwatch.
#[derive(Clone, Copy, Debug)]
pub struct Stopwatch {
    start: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.start = Instant::now();
    }

    #[inline]
    pub fn elapsed_nanos(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }

    #[inline]
    pub fn elapsed_millis(&self) -> f64 {
        self.elapsed_nanos() as f64 / 1e6
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::start()
    }
}

/// Accumulates named phase durations.
///
/// Backed by a `BTreeMap` so snapshots are sorted and deterministic.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PhaseRecorder {
    nanos: BTreeMap<String, u64>,
}

impl PhaseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.nanos.clear();
    }

    /// Accumulates `nanos` under `name`.
    pub fn add(&mut self, name: &str, nanos: u64) {
        *self.nanos.entry(name.to_owned()).or_insert(0) += nanos;
    }

    /// Phase time in nanoseconds; 0 if the phase never ran.
    pub fn nanos(&self, name: &str) -> u64 {
        self.nanos.get(name).copied().unwrap_or(0)
    }

    pub fn millis(&self, name: &str) -> f64 {
        self.nanos(name) as f64 / 1e6
    }

    /// Runs `f`, charging its wall time to `name`.
    ///
    /// The recorder is handed back into the closure so sub-phases can nest:
    /// `rec.scoped("run_build", |rec| ctx.build(ds, tie, rec))`.
    pub fn scoped<R>(&mut self, name: &str, f: impl FnOnce(&mut PhaseRecorder) -> R) -> R {
        let sw = Stopwatch::start();
        let out = f(self);
        self.add(name, sw.elapsed_nanos());
        out
    }

    /// Sorted `(name, nanos)` snapshot.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.nanos.iter().map(|(k, &v)| (k.clone(), v)).collect()
    }

    /// JSON object of `name_ms -> millis`, in sorted name order.
    pub fn to_json_millis(&self) -> String {
        let ms: BTreeMap<String, f64> = self
            .nanos
            .iter()
            .map(|(k, &v)| (format!("{k}_ms"), v as f64 / 1e6))
            .collect();
        serde_json::to_string(&ms).unwrap_or_else(|_| "{}".to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_by_name() {
        let mut rec = PhaseRecorder::new();
        rec.add("a", 5);
        rec.add("a", 7);
        rec.add("b", 1);
        assert_eq!(rec.nanos("a"), 12);
        assert_eq!(rec.nanos("b"), 1);
        assert_eq!(rec.nanos("missing"), 0);
    }

    #[test]
    fn scoped_nests_and_records() {
        let mut rec = PhaseRecorder::new();
        let out = rec.scoped("outer", |rec| {
            rec.scoped("inner", |_| 3u32);
            7u32
        });
        assert_eq!(out, 7);
        assert!(rec.nanos("outer") > 0);
        assert!(rec.nanos("inner") > 0);
        assert_eq!(rec.snapshot().len(), 2);
    }

    #[test]
    fn json_snapshot_is_sorted() {
        let mut rec = PhaseRecorder::new();
        rec.add("b_phase", 2_000_000);
        rec.add("a_phase", 1_000_000);
        let json = rec.to_json_millis();
        let a = json.find("a_phase_ms").unwrap();
        let b = json.find("b_phase_ms").unwrap();
        assert!(a < b);
    }
}
