use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Store, TickerStore};
use crate::session::Session;
use crate::ticker::{RecordId, TrackedTicker};

/// Wire form of one tracked-ticker record.
#[derive(Deserialize, Debug, Clone)]
pub(crate) struct TickerRecord {
    pub name: String,
}

pub(crate) fn collect_tracked(records: HashMap<RecordId, TickerRecord>) -> Vec<TrackedTicker> {
    records
        .into_iter()
        .map(|(key, record)| TrackedTicker {
            key,
            symbol: record.name,
        })
        .collect()
}

#[async_trait]
impl TickerStore for Store {
    async fn fetch_tickers(&self, session: &Session) -> Result<Vec<TrackedTicker>> {
        let url = self.document_url(&session.uid, "tickers");
        debug!("{}", url);
        let r = self.client.get(url).send().await?.error_for_status()?;
        // an absent collection comes back as a JSON null body
        let records: Option<HashMap<RecordId, TickerRecord>> = r.json().await?;
        Ok(records.map(collect_tracked).unwrap_or_default())
    }

    async fn delete_ticker(&self, session: &Session, key: &RecordId) -> Result<()> {
        let url = self.document_url(&session.uid, &format!("tickers/{}", key));
        info!("deleting ticker {}", key);
        self.client.delete(url).send().await?.error_for_status()?;
        Ok(())
    }
}
