//! Exchanges and per-symbol company metadata.

use super::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// A listing exchange. Declaration order is the catalog's default priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    Nasdaq,
    Nyse,
    Amex,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Nasdaq, Exchange::Nyse, Exchange::Amex];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Amex => "AMEX",
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NASDAQ" => Ok(Exchange::Nasdaq),
            "NYSE" => Ok(Exchange::Nyse),
            "AMEX" => Ok(Exchange::Amex),
            other => Err(format!("unknown exchange '{other}'")),
        }
    }
}

/// Company attributes for a symbol, merged across every exchange listing it.
///
/// `fields` holds the listing columns (`Name`, `Sector`, `industry`, ...) with
/// surrounding whitespace stripped. `exchanges` accumulates every exchange
/// the symbol was seen on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMetadata {
    pub symbol: Symbol,
    pub fields: BTreeMap<String, String>,
    pub exchanges: BTreeSet<Exchange>,
}

impl SymbolMetadata {
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            fields: BTreeMap::new(),
            exchanges: BTreeSet::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.as_str())
    }

    pub fn is_listed_on(&self, exchange: Exchange) -> bool {
        self.exchanges.contains(&exchange)
    }

    /// Overwrite listing fields with a later exchange's row, keeping the
    /// membership flags accumulated so far and adding `exchange`.
    pub fn merge_listing(&mut self, exchange: Exchange, fields: BTreeMap<String, String>) {
        self.fields.extend(fields);
        self.exchanges.insert(exchange);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_parses_case_insensitively() {
        assert_eq!("nyse".parse::<Exchange>().unwrap(), Exchange::Nyse);
        assert_eq!(" AMEX ".parse::<Exchange>().unwrap(), Exchange::Amex);
        assert!("LSE".parse::<Exchange>().is_err());
    }

    #[test]
    fn exchange_serializes_uppercase() {
        let json = serde_json::to_string(&Exchange::Nasdaq).unwrap();
        assert_eq!(json, "\"NASDAQ\"");
    }

    #[test]
    fn merge_overwrites_fields_and_accumulates_exchanges() {
        let mut meta = SymbolMetadata::new("DUAL");
        meta.merge_listing(
            Exchange::Nasdaq,
            BTreeMap::from([
                ("Name".to_string(), "Old Name".to_string()),
                ("Sector".to_string(), "Tech".to_string()),
            ]),
        );
        meta.merge_listing(
            Exchange::Nyse,
            BTreeMap::from([("Name".to_string(), "New Name".to_string())]),
        );

        assert_eq!(meta.field("Name"), Some("New Name"));
        assert_eq!(meta.field("Sector"), Some("Tech"));
        assert!(meta.is_listed_on(Exchange::Nasdaq));
        assert!(meta.is_listed_on(Exchange::Nyse));
        assert!(!meta.is_listed_on(Exchange::Amex));
    }
}
