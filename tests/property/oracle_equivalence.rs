//! Every framework's count equals the brute-force oracle, for any valid
//! dataset and any seed.

use proptest::prelude::*;

use sweepjoin::{oracle, run_once, Config, Sampler, Variant};

use crate::strategies::arb_dataset;

proptest! {
    #[test]
    fn counts_match_the_oracle(ds in arb_dataset(), seed in any::<u64>()) {
        let expect = u128::from(oracle::count_naive(&ds.r, &ds.s));

        for variant in [Variant::Sampling, Variant::EnumSampling, Variant::Adaptive] {
            let mut cfg = Config::default();
            cfg.run.variant = variant;
            cfg.run.t = 4;
            let mut sampler = Sampler::from_config(&cfg).unwrap();
            let report = run_once(&mut sampler, &ds, &cfg, seed);
            prop_assert!(report.ok, "{variant}: {:?}", report.error);
            prop_assert_eq!(report.count.value, expect, "variant {}", variant);
            prop_assert!(report.count.exact);
        }
    }

    #[test]
    fn adaptive_count_is_budget_invariant(
        ds in arb_dataset(),
        budget in 0u64..64,
        w_small in 0u64..8,
    ) {
        let expect = u128::from(oracle::count_naive(&ds.r, &ds.s));

        let mut cfg = Config::default();
        cfg.run.variant = Variant::Adaptive;
        cfg.run.t = 8;
        cfg.run.budget = budget;
        cfg.run.w_small = w_small;

        let mut sampler = Sampler::from_config(&cfg).unwrap();
        let report = run_once(&mut sampler, &ds, &cfg, 42);
        prop_assert!(report.ok, "{:?}", report.error);
        prop_assert_eq!(report.count.value, expect);
    }
}
