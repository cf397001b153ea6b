//! Shared fixtures and runner helpers for the integration tests.

use sweepjoin::{
    run_once, Config, Dataset, Rect, Relation, RunReport, Sampler, Variant,
};

pub fn rect(x0: f64, x1: f64, y0: f64, y1: f64) -> Rect {
    Rect::from_bounds(x0, x1, y0, y1)
}

pub fn relation(name: &str, rects: &[Rect]) -> Relation {
    let mut rel = Relation::new(name);
    for &r in rects {
        rel.push(r);
    }
    rel
}

pub fn cfg(variant: Variant, t: u64) -> Config {
    let mut cfg = Config::default();
    cfg.run.variant = variant;
    cfg.run.t = t;
    cfg
}

/// Builds the configured sampler and executes the full runner protocol.
pub fn run(ds: &Dataset, cfg: &Config, seed: u64) -> RunReport {
    let mut sampler = Sampler::from_config(cfg).expect("sampler construction");
    run_once(&mut sampler, ds, cfg, seed)
}

pub const ALL_VARIANTS: [Variant; 3] = [
    Variant::Sampling,
    Variant::EnumSampling,
    Variant::Adaptive,
];

/// The 3x3 fixture with exactly four intersecting pairs.
pub fn tiny_3x3() -> Dataset {
    let r = relation(
        "R",
        &[
            rect(0.0, 1.0, 0.0, 1.0),
            rect(0.5, 1.5, 0.5, 1.5),
            rect(2.0, 3.0, 2.0, 3.0),
        ],
    );
    let s = relation(
        "S",
        &[
            rect(0.2, 0.8, 0.2, 0.8),
            rect(1.0, 2.5, 1.0, 2.5),
            rect(3.0, 4.0, 0.0, 1.0),
        ],
    );
    Dataset::new("tiny_3x3", r, s)
}
