use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use crate::session::Session;
use crate::ticker::{RecordId, TrackedTicker};

mod settings_api;
mod tickers_api;

pub use settings_api::{CurrencySetting, SaveAction};

/// Access to the user's tracked-ticker collection.
#[async_trait]
pub trait TickerStore: Send + Sync {
    async fn fetch_tickers(&self, session: &Session) -> Result<Vec<TrackedTicker>>;
    async fn delete_ticker(&self, session: &Session, key: &RecordId) -> Result<()>;
}

/// HTTP client over the remote JSON-document store. Documents live under
/// `{base}/{uid}/...json` and collections are maps from record id to value.
#[derive(Debug, Clone)]
pub struct Store {
    client: Client,
    base_url: String,
}

impl Store {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn document_url(&self, uid: &str, path: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, uid, path)
    }
}
