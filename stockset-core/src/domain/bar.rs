//! DailyBar: one trading day of a symbol's history.

use super::Symbol;
use serde::{Deserialize, Serialize};

/// OHLCV record for a single symbol on a single day.
///
/// `date` is passed through exactly as the provider wrote it. The provider's
/// CSV header calls the column `timestamp`; cached files written by hand may
/// use `date`. Both are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    #[serde(alias = "timestamp")]
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Full daily history of one symbol, newest bar first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub symbol: Symbol,
    pub bars: Vec<DailyBar>,
}

impl TimeSeries {
    pub fn new(symbol: impl Into<Symbol>, bars: Vec<DailyBar>) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bar at `offset` days back from the most recent one.
    pub fn get(&self, offset: usize) -> Option<&DailyBar> {
        self.bars.get(offset)
    }

    /// The newest bar, if any.
    pub fn latest(&self) -> Option<&DailyBar> {
        self.bars.first()
    }
}
