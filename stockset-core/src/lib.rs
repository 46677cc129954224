//! stockset core: labeled training examples from cached daily price history.
//!
//! This crate contains:
//! - Domain types (daily bars, series, symbol metadata, examples)
//! - A fetcher that retries server errors with exponential backoff
//! - The symbol catalog, merged from per-exchange listings
//! - The time series store, which downloads, classifies and caches provider payloads
//! - The global flat index and the shuffled, lazy example sampler

pub mod config;
pub mod data;
pub mod domain;
pub mod sampler;

pub use config::{ConfigError, StocksetConfig};
pub use sampler::{generate_examples, ExampleSampler, Examples, GlobalIndex};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the stores and domain types can cross threads.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::DailyBar>();
        require_sync::<domain::DailyBar>();
        require_send::<domain::TimeSeries>();
        require_sync::<domain::TimeSeries>();
        require_send::<domain::SymbolMetadata>();
        require_sync::<domain::SymbolMetadata>();
        require_send::<domain::Example>();
        require_sync::<domain::Example>();

        require_send::<data::SymbolCatalog>();
        require_sync::<data::SymbolCatalog>();
        require_send::<data::TimeSeriesStore>();
        require_sync::<data::TimeSeriesStore>();
        require_send::<data::Fetcher>();
        require_sync::<data::Fetcher>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        require_send::<GlobalIndex>();
        require_sync::<GlobalIndex>();
        require_send::<StocksetConfig>();
        require_sync::<StocksetConfig>();
    }
}
