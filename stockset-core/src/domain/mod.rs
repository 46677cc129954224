//! Domain types for stockset

pub mod bar;
pub mod example;
pub mod symbol;

pub use bar::{DailyBar, TimeSeries};
pub use example::{Example, EXAMPLE_SIZE};
pub use symbol::{Exchange, SymbolMetadata};

/// Ticker symbol, the join key between the catalog and the series store.
pub type Symbol = String;
