use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::debug;

use super::{CoinDetail, PriceSource};
use crate::currency::Currency;

const ENDPOINT: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Clone, Default)]
pub struct CoinGecko {
    client: Client,
}

impl CoinGecko {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

/// Extract the displayed fields from a `/coins/{id}` payload. An
/// `{"error": ...}` body is surfaced with its message as-is.
pub(crate) fn parse_coin_payload(payload: Value, currency: Currency) -> Result<CoinDetail> {
    if let Some(error) = payload.get("error").and_then(Value::as_str) {
        bail!("{}", error);
    }

    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing coin id in payload"))?;
    let name = payload.get("name").and_then(Value::as_str).unwrap_or(id);
    let image_url = payload
        .pointer("/image/large")
        .and_then(Value::as_str)
        .unwrap_or_default();

    let code = currency.code();
    let price = payload
        .pointer(&format!("/market_data/current_price/{}", code))
        .cloned()
        .ok_or_else(|| anyhow!("no {} price for {}", code, id))?;
    let price: Decimal = serde_json::from_value(price)?;

    Ok(CoinDetail {
        id: id.to_string(),
        name: name.to_string(),
        image_url: image_url.to_string(),
        price,
    })
}

#[async_trait]
impl PriceSource for CoinGecko {
    async fn fetch_coin(&self, symbol: &str, currency: Currency) -> Result<CoinDetail> {
        let url = format!("{}/coins/{}", ENDPOINT, symbol.to_lowercase());
        debug!("{}", url);
        // no error_for_status : an unknown coin comes back as a non-2xx
        // response whose body carries the error message we surface
        let r = self
            .client
            .get(url)
            .header("accept", "application/json")
            .send()
            .await?;
        let payload: Value = r.json().await?;
        parse_coin_payload(payload, currency)
    }
}
