//! Example: one labeled training sample.

use super::{DailyBar, Symbol, SymbolMetadata};
use serde::Serialize;
use std::sync::Arc;

/// Number of prior days in an example's input window.
pub const EXAMPLE_SIZE: usize = 100;

/// An input window, the day that follows it, and the owning symbol's metadata.
///
/// `previous_days` is chronological (oldest first). `next_day` is the trading
/// row immediately after the last entry of `previous_days`.
#[derive(Debug, Clone, Serialize)]
pub struct Example {
    pub symbol: Symbol,
    pub previous_days: Vec<DailyBar>,
    pub next_day: DailyBar,
    pub metadata: Arc<SymbolMetadata>,
}
