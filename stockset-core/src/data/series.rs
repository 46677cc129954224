//! Time series store: per-symbol daily history, downloaded on first use.
//!
//! Layout: `{data_dir}/symbols/{SYMBOL}.csv`, the provider's CSV verbatim,
//! newest row first. An empty file is a valid cache state: the provider
//! confirmed it has no data for the symbol.
//!
//! Counts and parsed series are memoized independently. Counting never
//! parses; it counts line separators in the cached file.

use super::classify::{classify, ProviderResponse};
use super::error::DataError;
use super::fetcher::{backoff_delay, write_file, Fetcher};
use crate::domain::{DailyBar, Symbol, TimeSeries};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

pub const DEFAULT_PROVIDER_URL_TEMPLATE: &str = "https://www.alphavantage.co/query?function=TIME_SERIES_DAILY&symbol={symbol}&outputsize=full&apikey={api_key}&datatype=csv";

pub const DEFAULT_API_KEY_ENV: &str = "ALPHAVANTAGE_KEY";

/// Longest slice of an unrecognized payload kept in the error.
const PAYLOAD_PREVIEW_CHARS: usize = 200;

/// Read access to per-symbol series. Implemented by [`TimeSeriesStore`] and by test fakes.
pub trait SeriesSource {
    /// Number of daily bars available for `symbol`.
    fn entry_count(&self, symbol: &str) -> Result<usize, DataError>;

    /// The full parsed history, newest bar first.
    fn series_for(&self, symbol: &str) -> Result<Arc<TimeSeries>, DataError>;
}

/// Where and how to request a symbol's full daily history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoint {
    /// URL with `{symbol}` and `{api_key}` placeholders.
    pub url_template: String,
    /// Environment variable read for the key when `api_key` is unset.
    pub api_key_env: String,
    pub api_key: Option<String>,
}

impl ProviderEndpoint {
    /// Resolve the request URL. The key is looked up only here, on a cache miss.
    pub fn url_for(&self, symbol: &str) -> Result<String, DataError> {
        let key = match &self.api_key {
            Some(key) => key.clone(),
            None => std::env::var(&self.api_key_env).map_err(|_| DataError::MissingApiKey {
                env_var: self.api_key_env.clone(),
            })?,
        };
        Ok(self
            .url_template
            .replace("{symbol}", symbol)
            .replace("{api_key}", &key))
    }
}

impl Default for ProviderEndpoint {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_PROVIDER_URL_TEMPLATE.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            api_key: None,
        }
    }
}

/// Backoff applied when the provider signals throttling.
///
/// Each throttled response sleeps `base_delay * 2^i` for `i` in
/// `first_exponent..first_exponent + max_backoffs`; after the last one the
/// symbol is abandoned with a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub first_exponent: u32,
    pub max_backoffs: u32,
    pub base_delay: Duration,
}

impl ThrottlePolicy {
    pub fn delay_for(&self, exponent: u32) -> Duration {
        backoff_delay(self.base_delay, exponent)
    }

    fn exponents(&self) -> std::ops::Range<u32> {
        self.first_exponent..self.first_exponent.saturating_add(self.max_backoffs)
    }

    /// The sleep after each throttled response, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        self.exponents().map(move |exponent| self.delay_for(exponent))
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            first_exponent: 3,
            max_backoffs: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// What [`TimeSeriesStore::ensure_cached`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    AlreadyCached,
    Downloaded,
    /// The provider does not know the symbol; an empty file was cached.
    NotFound,
}

/// File-backed, memoizing store of daily series.
pub struct TimeSeriesStore {
    data_dir: PathBuf,
    fetcher: Fetcher,
    endpoint: ProviderEndpoint,
    throttle: ThrottlePolicy,
    counts: Mutex<HashMap<Symbol, usize>>,
    series: Mutex<HashMap<Symbol, Arc<TimeSeries>>>,
    // Held across the exists-check and download of a cache file.
    download_lock: Mutex<()>,
}

impl TimeSeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>, fetcher: Fetcher, endpoint: ProviderEndpoint) -> Self {
        Self {
            data_dir: data_dir.into(),
            fetcher,
            endpoint,
            throttle: ThrottlePolicy::default(),
            counts: Mutex::new(HashMap::new()),
            series: Mutex::new(HashMap::new()),
            download_lock: Mutex::new(()),
        }
    }

    pub fn with_throttle_policy(mut self, throttle: ThrottlePolicy) -> Self {
        self.throttle = throttle;
        self
    }

    /// Path of the cached series: `{data_dir}/symbols/{SYMBOL}.csv`
    pub fn series_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join("symbols").join(format!("{symbol}.csv"))
    }

    /// Make sure a usable cache file exists for `symbol`, downloading it if absent.
    ///
    /// Throttling is retried with backoff. A not-found answer caches an empty
    /// file and is never retried. Any failure removes the partially written
    /// file so a later run starts clean.
    pub fn ensure_cached(&self, symbol: &str) -> Result<CacheOutcome, DataError> {
        let _guard = self.download_lock.lock().unwrap_or_else(|e| e.into_inner());

        let path = self.series_path(symbol);
        if path.exists() {
            return Ok(CacheOutcome::AlreadyCached);
        }

        let result = self.download(symbol, &path);
        if result.is_err() {
            let _ = fs::remove_file(&path);
        }
        result
    }

    fn download(&self, symbol: &str, path: &Path) -> Result<CacheOutcome, DataError> {
        let url = self.endpoint.url_for(symbol)?;

        for delay in self.throttle.delays() {
            self.fetcher.fetch_and_store(&url, path)?;

            match classify(&read_payload(path)?) {
                ProviderResponse::Tabular(_) => return Ok(CacheOutcome::Downloaded),
                ProviderResponse::NotFound(message) => {
                    warn!("Download failed with error: {message}");
                    info!("Clearing downloaded file for {symbol}");
                    write_file(path, b"")?;
                    return Ok(CacheOutcome::NotFound);
                }
                ProviderResponse::Throttled(message) => {
                    warn!(
                        "API calls are being throttled ({message}). Will retry {symbol} in {} seconds...",
                        delay.as_secs_f64()
                    );
                    std::thread::sleep(delay);
                }
                ProviderResponse::Unrecognized(payload) => {
                    return Err(DataError::UnrecognizedResponse {
                        symbol: symbol.to_string(),
                        payload: payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect(),
                    });
                }
            }
        }

        Err(DataError::ThrottleBudgetExhausted {
            symbol: symbol.to_string(),
            attempts: self.throttle.max_backoffs,
        })
    }

    fn load_series(&self, symbol: &str) -> Result<TimeSeries, DataError> {
        self.ensure_cached(symbol)?;
        let path = self.series_path(symbol);
        let file = fs::File::open(&path)
            .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?;
        let bars = parse_series(symbol, file)?;
        Ok(TimeSeries::new(symbol, bars))
    }
}

impl SeriesSource for TimeSeriesStore {
    fn entry_count(&self, symbol: &str) -> Result<usize, DataError> {
        if let Some(series) = self
            .series
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(symbol)
        {
            return Ok(series.len());
        }

        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(&count) = counts.get(symbol) {
            return Ok(count);
        }

        self.ensure_cached(symbol)?;
        let count = count_lines(&self.series_path(symbol))?;
        counts.insert(symbol.to_string(), count);
        Ok(count)
    }

    fn series_for(&self, symbol: &str) -> Result<Arc<TimeSeries>, DataError> {
        let mut cache = self.series.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(series) = cache.get(symbol) {
            return Ok(Arc::clone(series));
        }

        let series = Arc::new(self.load_series(symbol)?);
        cache.insert(symbol.to_string(), Arc::clone(&series));
        Ok(series)
    }
}

fn read_payload(path: &Path) -> Result<String, DataError> {
    let bytes = fs::read(path)
        .map_err(|e| DataError::CacheError(format!("read {}: {e}", path.display())))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Number of data rows in a cached file: lines minus the header.
///
/// A final line without a trailing newline still counts, so the result
/// matches the row count [`parse_series`] yields for the same file.
pub fn count_lines(path: &Path) -> Result<usize, DataError> {
    let mut file = fs::File::open(path)
        .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut lines = 0usize;
    let mut last_byte = None;

    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| DataError::CacheError(format!("read {}: {e}", path.display())))?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count();
        last_byte = Some(buf[n - 1]);
    }

    if matches!(last_byte, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines.saturating_sub(1))
}

/// Parse a cached CSV payload into typed bars, preserving row order.
///
/// Any field that does not convert is fatal for the symbol.
pub fn parse_series<R: Read>(symbol: &str, reader: R) -> Result<Vec<DailyBar>, DataError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    csv.deserialize::<DailyBar>()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| DataError::MalformedRow {
                symbol: symbol.to_string(),
                row: i + 1,
                reason: e.to_string(),
            })
        })
        .collect()
}
