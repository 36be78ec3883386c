use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// Display currencies the user can pick from.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Eq,
    PartialEq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Currency {
    #[default]
    Cad,
    Eur,
    Gbp,
    Inr,
    Usd,
    Jpy,
    Cny,
    Rub,
    Krw,
}

impl Currency {
    /// The lowercase code used in the price source payload and the store.
    pub fn code(self) -> String {
        self.to_string()
    }

    pub fn label(self) -> &'static str {
        match self {
            Currency::Cad => "CAD - Canadian Dollar",
            Currency::Eur => "EUR - Euro",
            Currency::Gbp => "GBP - British Pound Sterling",
            Currency::Inr => "INR - Indian Rupee",
            Currency::Usd => "USD - US Dollar",
            Currency::Jpy => "JPY - Japanese Yen",
            Currency::Cny => "CNY - Chinese Yuan",
            Currency::Rub => "RUB - Russian Ruble",
            Currency::Krw => "KRW - South Korean Won",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::from_str(code.to_lowercase().as_str()).ok()
    }
}
