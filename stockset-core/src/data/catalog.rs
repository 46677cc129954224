//! Symbol catalog: exchange listings merged into one symbol → metadata map.
//!
//! Layout: `{data_dir}/exchanges/{EXCHANGE}.csv`, one listing per exchange,
//! downloaded on first use. Exchanges are merged in priority order: a symbol
//! keeps its first-seen position, later rows overwrite its fields, and the set
//! of exchanges it is listed on only ever grows.

use super::error::DataError;
use super::fetcher::Fetcher;
use crate::domain::{Exchange, Symbol, SymbolMetadata};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Listing column holding the ticker.
pub const SYMBOL_COLUMN: &str = "Symbol";

pub const DEFAULT_EXCHANGE_URL_TEMPLATE: &str =
    "http://www.nasdaq.com/screening/companies-by-industry.aspx?exchange={exchange}&render=download";

/// Read access to the known symbols. Implemented by [`SymbolCatalog`] and by test fakes.
pub trait SymbolSource {
    /// Every known symbol in first-seen order across the exchange priority list.
    fn list_symbols(&self) -> Result<Vec<Symbol>, DataError>;

    /// Metadata for a known symbol. Fails with `UnknownSymbol` otherwise.
    fn metadata_for(&self, symbol: &str) -> Result<Arc<SymbolMetadata>, DataError>;
}

/// The merged result of every exchange listing.
#[derive(Debug, Default)]
pub struct ExchangeListings {
    order: Vec<Symbol>,
    by_symbol: HashMap<Symbol, Arc<SymbolMetadata>>,
}

impl ExchangeListings {
    /// Merge listings given in priority order.
    pub fn merge<I>(listings: I) -> Self
    where
        I: IntoIterator<Item = (Exchange, Vec<BTreeMap<String, String>>)>,
    {
        let mut order = Vec::new();
        let mut merged: HashMap<Symbol, SymbolMetadata> = HashMap::new();

        for (exchange, rows) in listings {
            for row in rows {
                let Some(symbol) = row.get(SYMBOL_COLUMN).cloned() else {
                    continue;
                };
                let meta = merged.entry(symbol.clone()).or_insert_with(|| {
                    order.push(symbol.clone());
                    SymbolMetadata::new(symbol)
                });
                meta.merge_listing(exchange, row);
            }
        }

        let by_symbol = merged
            .into_iter()
            .map(|(symbol, meta)| (symbol, Arc::new(meta)))
            .collect();
        Self { order, by_symbol }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.order
    }

    pub fn get(&self, symbol: &str) -> Option<&Arc<SymbolMetadata>> {
        self.by_symbol.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Parse one exchange listing into rows keyed by column name.
///
/// Every header and field is whitespace-trimmed. Unnamed columns (trailing
/// delimiters) and rows with an empty symbol are dropped.
pub fn parse_listing<R: Read>(
    source_name: &str,
    reader: R,
) -> Result<Vec<BTreeMap<String, String>>, DataError> {
    let mut csv = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv
        .headers()
        .map_err(|e| DataError::CacheError(format!("read listing header {source_name}: {e}")))?
        .clone();

    if !headers.iter().any(|h| h == SYMBOL_COLUMN) {
        return Err(DataError::MissingColumn {
            source_name: source_name.to_string(),
            column: SYMBOL_COLUMN.to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in csv.records() {
        let record = record
            .map_err(|e| DataError::CacheError(format!("read listing {source_name}: {e}")))?;
        let row: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        if row.get(SYMBOL_COLUMN).map_or(true, |s| s.is_empty()) {
            continue;
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Lazily downloaded, merged, and memoized exchange listings.
pub struct SymbolCatalog {
    data_dir: PathBuf,
    exchanges: Vec<Exchange>,
    url_template: String,
    fetcher: Fetcher,
    listings: Mutex<Option<Arc<ExchangeListings>>>,
}

impl SymbolCatalog {
    pub fn new(data_dir: impl Into<PathBuf>, fetcher: Fetcher) -> Self {
        Self {
            data_dir: data_dir.into(),
            exchanges: Exchange::ALL.to_vec(),
            url_template: DEFAULT_EXCHANGE_URL_TEMPLATE.to_string(),
            fetcher,
            listings: Mutex::new(None),
        }
    }

    /// Replace the exchange priority list.
    pub fn with_exchanges(mut self, exchanges: Vec<Exchange>) -> Self {
        self.exchanges = exchanges;
        self
    }

    /// Replace the listing URL template (`{exchange}` placeholder).
    pub fn with_url_template(mut self, template: impl Into<String>) -> Self {
        self.url_template = template.into();
        self
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    /// Path of the cached listing: `{data_dir}/exchanges/{EXCHANGE}.csv`
    pub fn listing_path(&self, exchange: Exchange) -> PathBuf {
        self.data_dir
            .join("exchanges")
            .join(format!("{}.csv", exchange.as_str()))
    }

    pub fn listing_url(&self, exchange: Exchange) -> String {
        self.url_template.replace("{exchange}", exchange.as_str())
    }

    /// Make sure the listing file exists locally, downloading it if absent.
    fn ensure_listing(&self, exchange: Exchange) -> Result<PathBuf, DataError> {
        let path = self.listing_path(exchange);
        if !path.exists() {
            self.fetcher
                .fetch_and_store(&self.listing_url(exchange), &path)?;
        }
        Ok(path)
    }

    /// Pre-download every exchange listing without merging.
    pub fn warm_up(&self) -> Result<(), DataError> {
        for &exchange in &self.exchanges {
            let path = self.ensure_listing(exchange)?;
            debug!("listing for {exchange} cached at {}", path.display());
        }
        Ok(())
    }

    /// The merged listings, built on first call and shared afterwards.
    pub fn listings(&self) -> Result<Arc<ExchangeListings>, DataError> {
        let mut slot = self.listings.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(listings) = slot.as_ref() {
            return Ok(Arc::clone(listings));
        }

        let mut per_exchange = Vec::with_capacity(self.exchanges.len());
        for &exchange in &self.exchanges {
            let path = self.ensure_listing(exchange)?;
            per_exchange.push((exchange, read_listing(&path)?));
        }

        let listings = Arc::new(ExchangeListings::merge(per_exchange));
        info!(
            "catalog loaded: {} symbols across {} exchanges",
            listings.len(),
            self.exchanges.len()
        );
        *slot = Some(Arc::clone(&listings));
        Ok(listings)
    }
}

fn read_listing(path: &Path) -> Result<Vec<BTreeMap<String, String>>, DataError> {
    let file = fs::File::open(path)
        .map_err(|e| DataError::CacheError(format!("open {}: {e}", path.display())))?;
    parse_listing(&path.display().to_string(), file)
}

impl SymbolSource for SymbolCatalog {
    fn list_symbols(&self) -> Result<Vec<Symbol>, DataError> {
        Ok(self.listings()?.symbols().to_vec())
    }

    fn metadata_for(&self, symbol: &str) -> Result<Arc<SymbolMetadata>, DataError> {
        self.listings()?
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }
}
