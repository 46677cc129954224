//! Global flat index over every symbol's usable example offsets.
//!
//! A symbol with `n` bars contributes `max(0, n - example_size)` offsets.
//! Contributions are laid end to end in catalog order, so one flat integer
//! in `[0, total_examples)` names exactly one (symbol, offset) pair without
//! materializing the pairs.

use crate::data::{DataError, SeriesSource};
use crate::domain::Symbol;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalIndex {
    /// Eligible symbols only; parallel to `starts`.
    symbols: Vec<Symbol>,
    /// Flat offset of each eligible symbol's first example. Strictly ascending.
    starts: Vec<usize>,
    total: usize,
}

impl GlobalIndex {
    /// Build the index by counting entries for each symbol in order.
    pub fn build(
        symbols: &[Symbol],
        series: &dyn SeriesSource,
        example_size: usize,
    ) -> Result<Self, DataError> {
        let mut counts = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            counts.push((symbol.clone(), series.entry_count(symbol)?));
        }
        Ok(Self::from_counts(counts, example_size))
    }

    /// Build the index from precomputed `(symbol, entry_count)` pairs.
    ///
    /// Symbols with `entry_count <= example_size` are left out entirely.
    pub fn from_counts<I>(counts: I, example_size: usize) -> Self
    where
        I: IntoIterator<Item = (Symbol, usize)>,
    {
        let mut symbols = Vec::new();
        let mut starts = Vec::new();
        let mut total = 0usize;

        for (symbol, count) in counts {
            if count > example_size {
                symbols.push(symbol);
                starts.push(total);
                total += count - example_size;
            }
        }

        Self {
            symbols,
            starts,
            total,
        }
    }

    pub fn total_examples(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn eligible_symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Number of flat offsets owned by the eligible symbol at `position`.
    pub fn contribution(&self, position: usize) -> Option<usize> {
        let start = *self.starts.get(position)?;
        let end = self.starts.get(position + 1).copied().unwrap_or(self.total);
        Some(end - start)
    }

    /// Resolve a flat index to its owning symbol and intra-symbol offset.
    ///
    /// The owner is the symbol with the greatest start `<= flat`; a flat
    /// index equal to a start belongs to that symbol, not the previous one.
    pub fn resolve(&self, flat: usize) -> Option<(&str, usize)> {
        if flat >= self.total {
            return None;
        }
        // starts[0] == 0 <= flat, so at least one start qualifies.
        let position = self.starts.partition_point(|&start| start <= flat) - 1;
        Some((self.symbols[position].as_str(), flat - self.starts[position]))
    }
}
