//! End-to-end scenarios at fixed seeds.

use sweepjoin::{oracle, Dataset, Id, PairId, Variant};

use crate::util::{cfg, rect, relation, run, tiny_3x3, ALL_VARIANTS};

#[test]
fn tiny_3x3_counts_four_pairs_in_every_framework() {
    let ds = tiny_3x3();
    let expected: Vec<PairId> = vec![
        PairId::new(Id(0), Id(0)),
        PairId::new(Id(1), Id(0)),
        PairId::new(Id(1), Id(1)),
        PairId::new(Id(2), Id(1)),
    ];

    let mut oracle_pairs = oracle::collect_naive_pairs(&ds.r, &ds.s);
    oracle_pairs.sort_unstable();
    assert_eq!(oracle_pairs, expected);

    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 32), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 4, "{variant}");
        assert!(report.count.exact);
        assert_eq!(report.samples.len(), 32);
        for p in &report.samples.pairs {
            assert!(expected.contains(p), "{variant}: foreign pair {p}");
        }
    }
}

#[test]
fn half_open_touching_is_not_an_intersection() {
    let ds = Dataset::new(
        "touching",
        relation("R", &[rect(0.0, 1.0, 0.0, 1.0)]),
        relation("S", &[rect(1.0, 2.0, 0.0, 1.0)]),
    );

    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 16), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 0, "{variant}");
        assert!(report.samples.is_empty(), "{variant}");
    }
}

#[test]
fn identical_rectangles_across_sides_join_once() {
    let ds = Dataset::new(
        "identical",
        relation("R", &[rect(0.0, 1.0, 0.0, 1.0)]),
        relation("S", &[rect(0.0, 1.0, 0.0, 1.0)]),
    );
    let only = PairId::new(Id(0), Id(0));

    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 1000), 42);
        assert!(report.ok, "{variant}: {:?}", report.error);
        assert_eq!(report.count.value, 1, "{variant}");
        assert_eq!(report.samples.len(), 1000);
        assert!(report.samples.pairs.iter().all(|&p| p == only));
    }
}

#[test]
fn single_intersecting_pair_fills_every_slot() {
    let ds = Dataset::new(
        "single",
        relation("R", &[rect(0.0, 2.0, 0.0, 2.0)]),
        relation("S", &[rect(1.0, 3.0, 1.0, 3.0)]),
    );

    let report = run(&ds, &cfg(Variant::Sampling, 10), 42);
    assert!(report.ok);
    assert_eq!(report.count.value, 1);
    assert_eq!(report.samples.len(), 10);
    assert!(report
        .samples
        .pairs
        .iter()
        .all(|&p| p == PairId::new(Id(0), Id(0))));
}

#[test]
fn sample_set_flags_are_uniform_with_replacement() {
    let ds = tiny_3x3();
    for variant in ALL_VARIANTS {
        let report = run(&ds, &cfg(variant, 8), 42);
        assert!(report.samples.with_replacement);
        assert!(!report.samples.weighted);
    }
}
