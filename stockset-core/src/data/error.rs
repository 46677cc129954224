//! Structured error types for data operations.
//!
//! Every failure the fetch/cache layer can produce is a variant here, so
//! callers match on the kind instead of inspecting messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    /// Non-200 response, or a 5xx that survived every retry.
    #[error("HttpResponseError {status}: {body}")]
    HttpResponse { status: u16, body: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    /// The provider kept throttling. No symbol can make progress after this.
    #[error("throttled {attempts} times while downloading {symbol}; giving up")]
    ThrottleBudgetExhausted { symbol: String, attempts: u32 },

    #[error("unrecognized provider response for {symbol}: {payload}")]
    UnrecognizedResponse { symbol: String, payload: String },

    #[error("symbol not found in catalog: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("malformed row {row} in series for {symbol}: {reason}")]
    MalformedRow {
        symbol: String,
        row: usize,
        reason: String,
    },

    #[error("listing '{source_name}' has no '{column}' column")]
    MissingColumn { source_name: String, column: String },

    #[error(
        "offset {offset} out of range for {symbol}: need {needed} bars, series has {available}"
    )]
    OffsetOutOfRange {
        symbol: String,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("no provider API key configured; set {env_var}")]
    MissingApiKey { env_var: String },

    #[error("cache error: {0}")]
    CacheError(String),
}

impl DataError {
    /// Whether this error should end the whole run rather than a single operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DataError::ThrottleBudgetExhausted { .. })
    }
}
