use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Opaque key of a document in the remote store.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A symbol the user tracks, as stored in the remote store.
/// Rebuilt from the store on every refresh.
#[derive(Serialize, Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TrackedTicker {
    pub key: RecordId,
    pub symbol: String,
}

impl TrackedTicker {
    pub fn new(key: RecordId, symbol: &str) -> Self {
        Self {
            key,
            symbol: symbol.to_string(),
        }
    }
}

/// A tracked ticker joined with live price data, ready for display.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EnrichedTicker {
    pub id: String,
    pub key: RecordId,
    pub symbol: String,
    pub image_url: String,
    pub price: Decimal,
}

/// Sort a ticker list ascending by symbol, case-insensitive.
pub fn sort_by_symbol(tickers: &mut [EnrichedTicker]) {
    tickers.sort_by(|a, b| {
        a.symbol
            .to_lowercase()
            .cmp(&b.symbol.to_lowercase())
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
}
