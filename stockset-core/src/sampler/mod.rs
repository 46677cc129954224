//! Example sampler: a shuffled, lazy walk over the global index.
//!
//! Building the sampler counts entries for every symbol and draws one
//! uniform permutation of `[0, total_examples)`. Each pull resolves the next
//! permuted position to (symbol, offset), loads that symbol's series on first
//! use, and cuts out a single [`Example`].

pub mod index;

pub use index::GlobalIndex;

use crate::data::{DataError, SeriesSource, SymbolSource};
use crate::domain::{DailyBar, Example, EXAMPLE_SIZE};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

/// Produces example iterators. Holds no data between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleSampler {
    pub example_size: usize,
    /// Fixed shuffle seed. `None` draws a fresh order on every call.
    pub seed: Option<u64>,
}

impl Default for ExampleSampler {
    fn default() -> Self {
        Self {
            example_size: EXAMPLE_SIZE,
            seed: None,
        }
    }
}

impl ExampleSampler {
    pub fn new(example_size: usize, seed: Option<u64>) -> Self {
        Self { example_size, seed }
    }

    /// Rebuild the index and reshuffle, returning a fresh one-shot iterator.
    pub fn generate_examples<'a>(
        &self,
        symbols: &'a dyn SymbolSource,
        series: &'a dyn SeriesSource,
    ) -> Result<Examples<'a>, DataError> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        generate_examples(symbols, series, self.example_size, &mut rng)
    }
}

/// Build the global index over `symbols` and shuffle it with `rng`.
pub fn generate_examples<'a, R: Rng + ?Sized>(
    symbols: &'a dyn SymbolSource,
    series: &'a dyn SeriesSource,
    example_size: usize,
    rng: &mut R,
) -> Result<Examples<'a>, DataError> {
    let listed = symbols.list_symbols()?;
    let index = GlobalIndex::build(&listed, series, example_size)?;
    info!(
        "indexed {} examples from {} of {} symbols",
        index.total_examples(),
        index.eligible_symbols().len(),
        listed.len()
    );

    let mut order: Vec<usize> = (0..index.total_examples()).collect();
    order.shuffle(rng);

    Ok(Examples {
        symbols,
        series,
        example_size,
        index,
        order,
        cursor: 0,
    })
}

/// Lazy sequence of examples in shuffled order. Exhausts after `total_examples` items.
pub struct Examples<'a> {
    symbols: &'a dyn SymbolSource,
    series: &'a dyn SeriesSource,
    example_size: usize,
    index: GlobalIndex,
    order: Vec<usize>,
    cursor: usize,
}

impl<'a> Examples<'a> {
    pub fn index(&self) -> &GlobalIndex {
        &self.index
    }

    /// The flat positions this iterator will visit, in visiting order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    fn emit(&self, flat: usize) -> Result<Example, DataError> {
        let (symbol, offset) =
            self.index
                .resolve(flat)
                .ok_or_else(|| DataError::OffsetOutOfRange {
                    symbol: String::new(),
                    offset: flat,
                    needed: flat + 1,
                    available: self.index.total_examples(),
                })?;

        let series = self.series.series_for(symbol)?;
        let needed = offset + 1 + self.example_size;
        if series.len() < needed {
            return Err(DataError::OffsetOutOfRange {
                symbol: symbol.to_string(),
                offset,
                needed,
                available: series.len(),
            });
        }

        let next_day = series.bars[offset].clone();
        let mut previous_days: Vec<DailyBar> = series.bars[offset + 1..needed].to_vec();
        previous_days.reverse();

        Ok(Example {
            symbol: symbol.to_string(),
            previous_days,
            next_day,
            metadata: self.symbols.metadata_for(symbol)?,
        })
    }
}

impl Iterator for Examples<'_> {
    type Item = Result<Example, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        let flat = *self.order.get(self.cursor)?;
        self.cursor += 1;
        Some(self.emit(flat))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Examples<'_> {}
