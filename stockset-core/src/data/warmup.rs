//! Warm-up orchestrator: pre-downloads every listing and series before a run.

use super::catalog::{SymbolCatalog, SymbolSource};
use super::error::DataError;
use super::series::{CacheOutcome, TimeSeriesStore};
use tracing::info;

/// Progress callback for multi-symbol warm-up.
pub trait WarmUpProgress {
    /// Called before a symbol's cache file is checked.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called once the symbol's cache file exists.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: CacheOutcome);

    /// Called when every symbol has been handled.
    fn on_batch_complete(&self, summary: &WarmUpSummary);
}

/// Progress reporter that logs through `tracing`.
pub struct TracingProgress;

impl WarmUpProgress for TracingProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        tracing::debug!("[{}/{}] checking {symbol}", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: CacheOutcome) {
        match outcome {
            CacheOutcome::AlreadyCached => {}
            CacheOutcome::Downloaded => info!("[{}/{}] downloaded {symbol}", index + 1, total),
            CacheOutcome::NotFound => info!("[{}/{}] no data for {symbol}", index + 1, total),
        }
    }

    fn on_batch_complete(&self, summary: &WarmUpSummary) {
        info!(
            "warm-up complete: {} symbols, {} already cached, {} downloaded, {} not found",
            summary.total, summary.already_cached, summary.downloaded, summary.not_found
        );
    }
}

/// Summary of a warm-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmUpSummary {
    pub total: usize,
    pub already_cached: usize,
    pub downloaded: usize,
    pub not_found: usize,
}

impl WarmUpSummary {
    fn record(&mut self, outcome: CacheOutcome) {
        match outcome {
            CacheOutcome::AlreadyCached => self.already_cached += 1,
            CacheOutcome::Downloaded => self.downloaded += 1,
            CacheOutcome::NotFound => self.not_found += 1,
        }
    }
}

/// Ensure every catalog symbol has a series cache file, without parsing any.
///
/// Stops at the first error. Throttle exhaustion in particular is left for
/// the caller to treat as fatal.
pub fn warm_up_series(
    catalog: &SymbolCatalog,
    store: &TimeSeriesStore,
    progress: &dyn WarmUpProgress,
) -> Result<WarmUpSummary, DataError> {
    catalog.warm_up()?;
    let symbols = catalog.list_symbols()?;
    let mut summary = WarmUpSummary {
        total: symbols.len(),
        ..WarmUpSummary::default()
    };

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, summary.total);
        let outcome = store.ensure_cached(symbol)?;
        progress.on_complete(symbol, i, summary.total, outcome);
        summary.record(outcome);
    }

    progress.on_batch_complete(&summary);
    Ok(summary)
}
