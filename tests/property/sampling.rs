//! Sampling properties: membership, slot conservation, reproducibility.

use proptest::prelude::*;

use sweepjoin::{oracle, run_once, Config, Sampler, Variant};

use crate::strategies::arb_dataset;

proptest! {
    #[test]
    fn samples_are_join_members_and_fill_every_slot(
        ds in arb_dataset(),
        t in 1u64..64,
        seed in any::<u64>(),
    ) {
        let universe = oracle::collect_naive_pairs(&ds.r, &ds.s);

        for variant in [Variant::Sampling, Variant::EnumSampling, Variant::Adaptive] {
            let mut cfg = Config::default();
            cfg.run.variant = variant;
            cfg.run.t = t;
            let mut sampler = Sampler::from_config(&cfg).unwrap();
            let report = run_once(&mut sampler, &ds, &cfg, seed);
            prop_assert!(report.ok, "{variant}: {:?}", report.error);

            if universe.is_empty() {
                prop_assert!(report.samples.is_empty(), "variant {}", variant);
            } else {
                // Exactly t slots, each holding a real join pair.
                prop_assert_eq!(report.samples.len(), t as usize, "variant {}", variant);
                for p in &report.samples.pairs {
                    prop_assert!(universe.contains(p), "{variant}: foreign pair {p}");
                }
            }
        }
    }

    #[test]
    fn sample_bytes_are_reproducible(ds in arb_dataset(), seed in any::<u64>()) {
        for variant in [Variant::Sampling, Variant::EnumSampling, Variant::Adaptive] {
            let mut cfg = Config::default();
            cfg.run.variant = variant;
            cfg.run.t = 32;
            let mut sampler = Sampler::from_config(&cfg).unwrap();
            let a = run_once(&mut sampler, &ds, &cfg, seed);
            let mut sampler = Sampler::from_config(&cfg).unwrap();
            let b = run_once(&mut sampler, &ds, &cfg, seed);
            prop_assert!(a.ok && b.ok);
            prop_assert_eq!(&a.samples, &b.samples, "variant {}", variant);
        }
    }

    #[test]
    fn adaptive_budget_never_changes_the_zero_budget_bytes(
        ds in arb_dataset(),
        seed in any::<u64>(),
    ) {
        // budget = 0 must be byte-identical to the plain two-pass variant.
        let mut cfg_sampling = Config::default();
        cfg_sampling.run.variant = Variant::Sampling;
        cfg_sampling.run.t = 24;

        let mut cfg_adaptive = cfg_sampling.clone();
        cfg_adaptive.run.variant = Variant::Adaptive;
        cfg_adaptive.run.budget = 0;
        cfg_adaptive.run.w_small = 3;

        let mut sampler = Sampler::from_config(&cfg_sampling).unwrap();
        let a = run_once(&mut sampler, &ds, &cfg_sampling, seed);
        let mut sampler = Sampler::from_config(&cfg_adaptive).unwrap();
        let b = run_once(&mut sampler, &ds, &cfg_adaptive, seed);
        prop_assert!(a.ok && b.ok);
        prop_assert_eq!(&a.samples, &b.samples);
    }
}
