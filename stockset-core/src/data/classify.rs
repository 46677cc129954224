//! Classification of raw provider payloads.
//!
//! The provider answers a daily-series request with CSV on success and with a
//! small JSON document on failure. A payload that parses as JSON is never a
//! series: its keys say whether the symbol is unknown or the caller is being
//! throttled.

use serde_json::Value;

/// JSON key the provider uses for an invalid or unknown symbol.
pub const ERROR_MARKER: &str = "Error Message";

/// JSON keys the provider uses for rate-limit notices.
pub const THROTTLE_MARKERS: [&str; 2] = ["Information", "Note"];

/// What a cached download actually contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    /// Plain tabular payload, accepted as the cached series.
    Tabular(String),
    /// The provider does not know the symbol.
    NotFound(String),
    /// The provider asked us to slow down.
    Throttled(String),
    /// A structured document with neither marker.
    Unrecognized(String),
}

/// Classify a payload by shape first, then by marker key.
pub fn classify(payload: &str) -> ProviderResponse {
    let doc = match serde_json::from_str::<Value>(payload) {
        Ok(doc) => doc,
        Err(_) => return ProviderResponse::Tabular(payload.to_string()),
    };

    if let Some(message) = doc.get(ERROR_MARKER) {
        return ProviderResponse::NotFound(marker_text(message));
    }
    if let Some(message) = THROTTLE_MARKERS.iter().find_map(|key| doc.get(*key)) {
        return ProviderResponse::Throttled(marker_text(message));
    }
    ProviderResponse::Unrecognized(payload.to_string())
}

fn marker_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_is_tabular() {
        let csv = "timestamp,open,high,low,close,volume\n2024-01-02,1,2,1,2,10\n";
        assert_eq!(classify(csv), ProviderResponse::Tabular(csv.to_string()));
    }

    #[test]
    fn empty_payload_is_tabular() {
        assert_eq!(classify(""), ProviderResponse::Tabular(String::new()));
    }

    #[test]
    fn error_message_is_not_found() {
        let body = r#"{"Error Message": "Invalid API call."}"#;
        assert_eq!(
            classify(body),
            ProviderResponse::NotFound("Invalid API call.".into())
        );
    }

    #[test]
    fn information_and_note_are_throttled() {
        let info = r#"{"Information": "Thank you for using Alpha Vantage!"}"#;
        let note = r#"{"Note": "API call frequency is 5 calls per minute."}"#;
        assert!(matches!(classify(info), ProviderResponse::Throttled(_)));
        assert!(matches!(classify(note), ProviderResponse::Throttled(_)));
    }

    #[test]
    fn error_marker_wins_over_throttle_marker() {
        let body = r#"{"Error Message": "bad", "Information": "slow down"}"#;
        assert_eq!(classify(body), ProviderResponse::NotFound("bad".into()));
    }

    #[test]
    fn other_documents_are_unrecognized() {
        let body = r#"{"Meta Data": {"1. Information": "Daily Prices"}}"#;
        assert_eq!(
            classify(body),
            ProviderResponse::Unrecognized(body.to_string())
        );
        assert!(matches!(classify("42"), ProviderResponse::Unrecognized(_)));
    }
}
