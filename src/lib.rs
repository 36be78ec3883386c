use aggregator::AggregatorEvent;
use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod currency;
pub mod market;
pub mod session;
pub mod store;
pub mod ticker;
pub mod tui;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum AppEvent {
    Aggregator(AggregatorEvent),
}
