use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

pub mod coingecko;

pub use coingecko::CoinGecko;

/// Live market data for one coin, price already picked for the requested
/// display currency.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CoinDetail {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub price: Decimal,
}

/// External source of live coin data, one lookup per symbol.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Lookup is case-insensitive. An unknown symbol is a domain error whose
    /// message is the source's error message verbatim.
    async fn fetch_coin(&self, symbol: &str, currency: Currency) -> Result<CoinDetail>;
}
