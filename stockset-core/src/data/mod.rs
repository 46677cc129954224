//! Data fetching and caching

pub mod catalog;
pub mod classify;
pub mod error;
pub mod fetcher;
pub mod series;
pub mod warmup;

pub use catalog::{ExchangeListings, SymbolCatalog, SymbolSource};
pub use classify::{classify, ProviderResponse};
pub use error::DataError;
pub use fetcher::{Fetcher, HttpClient, HttpResponse, ReqwestClient, RetryPolicy};
pub use series::{CacheOutcome, ProviderEndpoint, SeriesSource, ThrottlePolicy, TimeSeriesStore};
pub use warmup::{warm_up_series, TracingProgress, WarmUpProgress, WarmUpSummary};
