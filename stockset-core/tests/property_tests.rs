//! Property tests for the global index.
//!
//! Uses proptest to verify:
//! 1. Total count: `total_examples` is the sum of every symbol's contribution
//! 2. Bijection: every flat index resolves to one (symbol, offset) and every
//!    contributed offset is hit exactly once
//! 3. Exclusion: symbols at or below the threshold never appear

use proptest::prelude::*;
use std::collections::HashSet;
use stockset_core::GlobalIndex;

fn arb_counts() -> impl Strategy<Value = (Vec<(String, usize)>, usize)> {
    (1usize..20).prop_flat_map(|example_size| {
        (
            prop::collection::vec(0usize..60, 0..12).prop_map(|lens| {
                lens.into_iter()
                    .enumerate()
                    .map(|(i, n)| (format!("S{i}"), n))
                    .collect::<Vec<_>>()
            }),
            Just(example_size),
        )
    })
}

proptest! {
    #[test]
    fn total_is_sum_of_contributions((counts, example_size) in arb_counts()) {
        let index = GlobalIndex::from_counts(counts.clone(), example_size);
        let expected: usize = counts
            .iter()
            .map(|(_, n)| n.saturating_sub(example_size))
            .sum();
        prop_assert_eq!(index.total_examples(), expected);
    }

    #[test]
    fn resolution_is_a_bijection((counts, example_size) in arb_counts()) {
        let index = GlobalIndex::from_counts(counts.clone(), example_size);

        let mut seen = HashSet::new();
        for flat in 0..index.total_examples() {
            let (symbol, offset) = index.resolve(flat).unwrap();
            let count = counts.iter().find(|(s, _)| s == symbol).unwrap().1;
            prop_assert!(offset < count - example_size);
            prop_assert!(seen.insert((symbol.to_string(), offset)));
        }
        prop_assert_eq!(index.resolve(index.total_examples()), None);

        let expected: HashSet<(String, usize)> = counts
            .iter()
            .flat_map(|(s, n)| (0..n.saturating_sub(example_size)).map(move |o| (s.clone(), o)))
            .collect();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn short_symbols_are_excluded((counts, example_size) in arb_counts()) {
        let index = GlobalIndex::from_counts(counts.clone(), example_size);
        for (symbol, n) in &counts {
            let listed = index.eligible_symbols().contains(symbol);
            prop_assert_eq!(listed, *n > example_size);
        }
    }
}
