//! Boundary behaviors: zero slots, empty joins, degenerate y-domains.

use sweepjoin::phase::PhaseRecorder;
use sweepjoin::{oracle, Dataset, JoinSampler, Relation, Rng, TwoPassSampler, Variant};

use crate::util::{cfg, rect, relation, run, tiny_3x3, ALL_VARIANTS};

#[test]
fn zero_slots_is_a_defined_no_op() {
    let ds = tiny_3x3();
    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 0), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 4);
        assert!(report.samples.is_empty(), "{variant}");
    }
}

#[test]
fn empty_relations_count_zero_without_failing() {
    let ds = Dataset::new("empty", Relation::new("R"), Relation::new("S"));
    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 32), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 0);
        assert!(report.samples.is_empty());
    }
}

#[test]
fn one_sided_dataset_counts_zero() {
    let ds = Dataset::new(
        "one_sided",
        relation("R", &[rect(0.0, 1.0, 0.0, 1.0)]),
        Relation::new("S"),
    );
    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 8), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 0);
        assert!(report.samples.is_empty());
    }
}

#[test]
fn all_equal_lower_y_collapses_to_one_rank() {
    // Every rectangle shares lo[1] = 0, so the compressed y-domain has a
    // single rank and the range pattern contributes nothing; counting
    // reduces to pure stabbing. Results must still match the oracle.
    let ds = Dataset::new(
        "flat_y",
        relation(
            "R",
            &[
                rect(0.0, 2.0, 0.0, 1.0),
                rect(1.0, 3.0, 0.0, 2.0),
                rect(4.0, 5.0, 0.0, 1.5),
            ],
        ),
        relation(
            "S",
            &[
                rect(0.5, 1.5, 0.0, 3.0),
                rect(2.5, 4.5, 0.0, 0.5),
            ],
        ),
    );

    let mut ctx_probe = TwoPassSampler::new();
    let mut phases = PhaseRecorder::new();
    ctx_probe
        .build(&ds, &cfg(Variant::Sampling, 1), &mut phases)
        .unwrap();
    assert_eq!(ctx_probe.context().y_domain_size(), 1);

    let expect = oracle::count_naive(&ds.r, &ds.s);
    assert!(expect > 0);
    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 64), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, u128::from(expect), "{variant}");
        assert_eq!(report.samples.len(), 64);

        let universe = oracle::collect_naive_pairs(&ds.r, &ds.s);
        for p in &report.samples.pairs {
            assert!(universe.contains(p));
        }
    }
}

#[test]
fn oversized_t_is_a_config_error() {
    let ds = tiny_3x3();
    let config = cfg(Variant::Sampling, u64::from(u32::MAX) + 1);
    let report = run(&ds, &config, 42);
    assert!(!report.ok);
    assert!(report.error.unwrap().contains("u32"));
}

#[test]
fn improper_rectangle_is_rejected_before_any_phase() {
    let ds = Dataset::new(
        "bad",
        relation("R", &[rect(1.0, 1.0, 0.0, 1.0)]),
        relation("S", &[rect(0.0, 1.0, 0.0, 1.0)]),
    );
    let report = run(&ds, &cfg(Variant::Sampling, 4), 42);
    assert!(!report.ok);
    assert!(report.error.unwrap().contains("proper"));
    assert_eq!(report.phases.nanos("run_build"), 0);
}

#[test]
fn zero_width_slices_never_join() {
    // Rectangles that merely stack along y with touching edges.
    let ds = Dataset::new(
        "stacked_touching",
        relation("R", &[rect(0.0, 1.0, 0.0, 1.0)]),
        relation("S", &[rect(0.0, 1.0, 1.0, 2.0)]),
    );
    let report = run(&ds, &cfg(Variant::Sampling, 8), 42);
    assert!(report.ok);
    assert_eq!(report.count.value, 0);
}

#[test]
fn sample_without_prior_count_is_self_sufficient() {
    // The runner always counts first, but the contract lets a caller
    // invoke sample directly after build.
    let ds = tiny_3x3();
    let config = cfg(Variant::Sampling, 16);
    let mut sampler = TwoPassSampler::new();
    let mut phases = PhaseRecorder::new();
    sampler.build(&ds, &config, &mut phases).unwrap();
    let mut rng = Rng::new(7);
    let set = sampler.sample(&config, &mut rng, &mut phases).unwrap();
    assert_eq!(set.len(), 16);
}
