use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Store;
use crate::currency::Currency;
use crate::session::Session;
use crate::ticker::RecordId;

/// Persisted currency preference. Conceptually a singleton per user; legacy
/// data may still hold several records.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CurrencySetting {
    pub currency: String,
    pub currency_label: String,
}

impl From<Currency> for CurrencySetting {
    fn from(currency: Currency) -> Self {
        Self {
            currency: currency.code(),
            currency_label: currency.label().to_string(),
        }
    }
}

impl CurrencySetting {
    pub fn as_currency(&self) -> Option<Currency> {
        Currency::from_code(&self.currency)
    }
}

/// How a save lands in the store.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SaveAction {
    Create,
    Overwrite(RecordId),
}

impl SaveAction {
    /// The setting is a singleton : overwrite the first existing record in
    /// place, create one only when the collection is empty.
    pub fn plan(existing: &HashMap<RecordId, CurrencySetting>) -> Self {
        match existing.keys().min() {
            Some(key) => SaveAction::Overwrite(key.clone()),
            None => SaveAction::Create,
        }
    }
}

/// Response of the store when a record is created.
#[derive(Deserialize, Debug)]
struct CreatedRecord {
    name: String,
}

impl Store {
    pub async fn fetch_currency_settings(
        &self,
        session: &Session,
    ) -> Result<HashMap<RecordId, CurrencySetting>> {
        let url = self.document_url(&session.uid, "settings/currency");
        debug!("{}", url);
        let r = self.client.get(url).send().await?.error_for_status()?;
        let records: Option<HashMap<RecordId, CurrencySetting>> = r.json().await?;
        Ok(records.unwrap_or_default())
    }

    /// The saved preference, if any. With several legacy records the one
    /// with the smallest id wins.
    pub async fn current_currency_setting(
        &self,
        session: &Session,
    ) -> Result<Option<CurrencySetting>> {
        let records = self.fetch_currency_settings(session).await?;
        Ok(records
            .into_iter()
            .min_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, setting)| setting))
    }

    pub async fn save_currency_setting(
        &self,
        session: &Session,
        currency: Currency,
    ) -> Result<RecordId> {
        let setting = CurrencySetting::from(currency);
        let existing = self.fetch_currency_settings(session).await?;

        match SaveAction::plan(&existing) {
            SaveAction::Create => {
                let url = self.document_url(&session.uid, "settings/currency");
                let r = self
                    .client
                    .post(url)
                    .json(&setting)
                    .send()
                    .await?
                    .error_for_status()?;
                let created: CreatedRecord = r.json().await?;
                info!("created currency setting {}", created.name);
                Ok(RecordId(created.name))
            }
            SaveAction::Overwrite(key) => {
                let url = self.document_url(&session.uid, &format!("settings/currency/{}", key));
                self.client
                    .put(url)
                    .json(&setting)
                    .send()
                    .await?
                    .error_for_status()?;
                info!("updated currency setting {}", key);
                Ok(key)
            }
        }
    }
}
