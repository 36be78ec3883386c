use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::currency::Currency;
use crate::market::{CoinDetail, PriceSource};
use crate::session::Session;
use crate::store::TickerStore;
use crate::ticker::{sort_by_symbol, EnrichedTicker, RecordId, TrackedTicker};
use crate::AppEvent;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum AggregatorCommand {
    Refresh,
    DeleteTicker { key: RecordId },
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum AggregatorEvent {
    /// New sorted snapshot, published once per successful lookup arrival.
    Snapshot(Vec<EnrichedTicker>),
    /// A lookup failed; its ticker is omitted from the list.
    LookupFailed(LookupFailure),
    /// Every lookup of the refresh has settled.
    RefreshCompleted(RefreshOutcome),
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LookupFailure {
    pub key: RecordId,
    pub symbol: String,
    pub message: String,
}

/// Final result of one refresh : the sorted list plus every lookup that
/// failed along the way.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RefreshOutcome {
    pub tracked: usize,
    pub tickers: Vec<EnrichedTicker>,
    pub failures: Vec<LookupFailure>,
    pub finished_at: DateTime<Utc>,
}

struct LookupOutcome {
    generation: u64,
    ticker: TrackedTicker,
    result: Result<CoinDetail>,
}

/// Coordinator owning the displayed ticker list. A refresh fetches the
/// tracked collection, fans out one independent lookup task per symbol and
/// applies outcomes one at a time as they arrive over a channel. Each
/// refresh gets a new generation; outcomes from a superseded generation are
/// discarded, so overlapping refreshes cannot mix entries.
pub struct Aggregator<S, P> {
    store: S,
    source: Arc<P>,
    session: Session,
    currency: Currency,
    cmd_rx: mpsc::Receiver<AggregatorCommand>,
    outcome_tx: mpsc::Sender<LookupOutcome>,
    outcome_rx: mpsc::Receiver<LookupOutcome>,
    events: broadcast::Sender<AppEvent>,
    generation: u64,
    expected: usize,
    settled: usize,
    tickers: Vec<EnrichedTicker>,
    failures: Vec<LookupFailure>,
}

impl<S, P> Aggregator<S, P>
where
    S: TickerStore,
    P: PriceSource + 'static,
{
    pub fn new(
        store: S,
        source: P,
        session: Session,
        currency: Currency,
        cmd_rx: mpsc::Receiver<AggregatorCommand>,
        events: broadcast::Sender<AppEvent>,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel(64);
        Self {
            store,
            source: Arc::new(source),
            session,
            currency,
            cmd_rx,
            outcome_tx,
            outcome_rx,
            events,
            generation: 0,
            expected: 0,
            settled: 0,
            tickers: vec![],
            failures: vec![],
        }
    }

    /// Process commands and lookup outcomes until the command channel
    /// closes.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(AggregatorCommand::Refresh) => self.start_refresh().await,
                    Some(AggregatorCommand::DeleteTicker { key }) => {
                        if let Err(err) = self.store.delete_ticker(&self.session, &key).await {
                            error!("failed to delete ticker {} : {:#}", key, err);
                        }
                        self.start_refresh().await;
                    }
                    None => break,
                },
                Some(outcome) = self.outcome_rx.recv() => self.apply_outcome(outcome),
            }
        }
    }

    async fn start_refresh(&mut self) {
        self.generation += 1;
        let generation = self.generation;

        let tracked = match self.store.fetch_tickers(&self.session).await {
            Ok(tracked) => tracked,
            Err(err) => {
                // store unreachable : log only, keep whatever was displayed
                // and republish the previous outcome so one-shot callers
                // still terminate
                error!("failed to fetch tracked tickers : {:#}", err);
                self.publish_completed();
                return;
            }
        };
        info!("refresh #{} : {} tracked tickers", generation, tracked.len());

        self.tickers.clear();
        self.failures.clear();
        self.settled = 0;
        self.expected = tracked.len();

        if tracked.is_empty() {
            self.publish(AggregatorEvent::Snapshot(vec![]));
            self.publish_completed();
            return;
        }

        for ticker in tracked {
            let source = self.source.clone();
            let currency = self.currency;
            let outcome_tx = self.outcome_tx.clone();
            tokio::task::spawn(async move {
                let result = source.fetch_coin(&ticker.symbol, currency).await;
                let _ = outcome_tx
                    .send(LookupOutcome {
                        generation,
                        ticker,
                        result,
                    })
                    .await;
            });
        }
    }

    fn apply_outcome(&mut self, outcome: LookupOutcome) {
        if outcome.generation != self.generation {
            debug!(
                "discarding lookup for {} from superseded refresh #{}",
                outcome.ticker.symbol, outcome.generation
            );
            return;
        }

        self.settled += 1;
        match outcome.result {
            Ok(detail) => {
                self.tickers.push(EnrichedTicker {
                    id: detail.id,
                    key: outcome.ticker.key,
                    symbol: detail.name,
                    image_url: detail.image_url,
                    price: detail.price,
                });
                sort_by_symbol(&mut self.tickers);
                self.publish(AggregatorEvent::Snapshot(self.tickers.clone()));
            }
            Err(err) => {
                let failure = LookupFailure {
                    key: outcome.ticker.key,
                    symbol: outcome.ticker.symbol,
                    message: format!("{err:#}"),
                };
                warn!("lookup failed for {} : {}", failure.symbol, failure.message);
                self.failures.push(failure.clone());
                self.publish(AggregatorEvent::LookupFailed(failure));
            }
        }

        if self.settled == self.expected {
            self.publish_completed();
        }
    }

    fn publish_completed(&self) {
        self.publish(AggregatorEvent::RefreshCompleted(RefreshOutcome {
            tracked: self.expected,
            tickers: self.tickers.clone(),
            failures: self.failures.clone(),
            finished_at: Utc::now(),
        }));
    }

    fn publish(&self, event: AggregatorEvent) {
        // no subscriber is fine
        let _ = self.events.send(AppEvent::Aggregator(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::timeout;

    #[derive(Clone, Default)]
    struct FakeStore {
        tickers: Arc<Mutex<Vec<TrackedTicker>>>,
        deleted: Arc<Mutex<Vec<RecordId>>>,
        unreachable: bool,
    }

    impl FakeStore {
        fn with_tickers(entries: &[(&str, &str)]) -> Self {
            let tickers = entries
                .iter()
                .map(|(key, symbol)| TrackedTicker::new(RecordId::new(key), symbol))
                .collect();
            Self {
                tickers: Arc::new(Mutex::new(tickers)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TickerStore for FakeStore {
        async fn fetch_tickers(&self, _session: &Session) -> Result<Vec<TrackedTicker>> {
            if self.unreachable {
                bail!("store unreachable");
            }
            Ok(self.tickers.lock().unwrap().clone())
        }

        async fn delete_ticker(&self, _session: &Session, key: &RecordId) -> Result<()> {
            self.tickers.lock().unwrap().retain(|t| &t.key != key);
            self.deleted.lock().unwrap().push(key.clone());
            Ok(())
        }
    }

    struct FakePrices {
        prices: HashMap<String, Decimal>,
    }

    impl FakePrices {
        fn with_prices(entries: &[(&str, Decimal)]) -> Self {
            Self {
                prices: entries
                    .iter()
                    .map(|(symbol, price)| (symbol.to_string(), *price))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl PriceSource for FakePrices {
        async fn fetch_coin(&self, symbol: &str, _currency: Currency) -> Result<CoinDetail> {
            match self.prices.get(&symbol.to_lowercase()) {
                Some(price) => Ok(CoinDetail {
                    id: symbol.to_lowercase(),
                    name: symbol.to_lowercase(),
                    image_url: format!("https://img.example.com/{}.png", symbol),
                    price: *price,
                }),
                None => bail!("coin not found"),
            }
        }
    }

    fn spawn_aggregator(
        store: FakeStore,
        prices: FakePrices,
    ) -> (
        mpsc::Sender<AggregatorCommand>,
        broadcast::Receiver<AppEvent>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = broadcast::channel(64);
        let aggregator = Aggregator::new(
            store,
            prices,
            Session::new("user-1", None),
            Currency::Cad,
            cmd_rx,
            event_tx,
        );
        tokio::task::spawn(aggregator.run());
        (cmd_tx, event_rx)
    }

    async fn wait_completed(rx: &mut broadcast::Receiver<AppEvent>) -> RefreshOutcome {
        loop {
            let event = timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("no completion event")
                .expect("event channel closed");
            if let AppEvent::Aggregator(AggregatorEvent::RefreshCompleted(outcome)) = event {
                return outcome;
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_produces_sorted_list() {
        let store = FakeStore::with_tickers(&[
            ("k2", "ethereum"),
            ("k1", "bitcoin"),
            ("k3", "solana"),
        ]);
        let prices = FakePrices::with_prices(&[
            ("ethereum", dec!(4500)),
            ("bitcoin", dec!(91000)),
            ("solana", dec!(250)),
        ]);
        let (cmd_tx, mut event_rx) = spawn_aggregator(store, prices);

        cmd_tx.send(AggregatorCommand::Refresh).await.unwrap();
        let outcome = wait_completed(&mut event_rx).await;

        assert_eq!(outcome.tracked, 3);
        assert!(outcome.failures.is_empty());
        let symbols: Vec<&str> = outcome.tickers.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["bitcoin", "ethereum", "solana"]);
    }

    #[tokio::test]
    async fn test_failed_lookup_is_omitted_and_reported() {
        let store = FakeStore::with_tickers(&[("k1", "bitcoin"), ("k2", "dogelephant")]);
        let prices = FakePrices::with_prices(&[("bitcoin", dec!(91000))]);
        let (cmd_tx, mut event_rx) = spawn_aggregator(store, prices);

        cmd_tx.send(AggregatorCommand::Refresh).await.unwrap();

        let mut alert = None;
        let outcome = loop {
            let event = timeout(Duration::from_secs(5), event_rx.recv())
                .await
                .unwrap()
                .unwrap();
            match event {
                AppEvent::Aggregator(AggregatorEvent::LookupFailed(failure)) => {
                    alert = Some(failure);
                }
                AppEvent::Aggregator(AggregatorEvent::RefreshCompleted(outcome)) => break outcome,
                _ => {}
            }
        };

        assert_eq!(outcome.tickers.len(), 1);
        assert_eq!(outcome.tickers[0].symbol, "bitcoin");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].message, "coin not found");
        let alert = alert.expect("no alert event");
        assert_eq!(alert.symbol, "dogelephant");
        assert_eq!(alert.message, "coin not found");
    }

    #[tokio::test]
    async fn test_delete_removes_entry_after_refresh() {
        let store = FakeStore::with_tickers(&[("k1", "bitcoin"), ("k2", "ethereum")]);
        let deleted = store.deleted.clone();
        let prices =
            FakePrices::with_prices(&[("bitcoin", dec!(91000)), ("ethereum", dec!(4500))]);
        let (cmd_tx, mut event_rx) = spawn_aggregator(store, prices);

        cmd_tx
            .send(AggregatorCommand::DeleteTicker {
                key: RecordId::new("k1"),
            })
            .await
            .unwrap();
        let outcome = wait_completed(&mut event_rx).await;

        assert_eq!(*deleted.lock().unwrap(), vec![RecordId::new("k1")]);
        assert_eq!(outcome.tracked, 1);
        let symbols: Vec<&str> = outcome.tickers.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ethereum"]);
    }

    #[tokio::test]
    async fn test_empty_collection_publishes_empty_snapshot() {
        let store = FakeStore::default();
        let prices = FakePrices::with_prices(&[]);
        let (cmd_tx, mut event_rx) = spawn_aggregator(store, prices);

        cmd_tx.send(AggregatorCommand::Refresh).await.unwrap();

        let mut snapshot = None;
        let outcome = loop {
            let event = timeout(Duration::from_secs(5), event_rx.recv())
                .await
                .unwrap()
                .unwrap();
            match event {
                AppEvent::Aggregator(AggregatorEvent::Snapshot(tickers)) => {
                    snapshot = Some(tickers);
                }
                AppEvent::Aggregator(AggregatorEvent::RefreshCompleted(outcome)) => break outcome,
                _ => {}
            }
        };

        assert_eq!(snapshot, Some(vec![]));
        assert_eq!(outcome.tracked, 0);
        assert!(outcome.tickers.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_republishes_previous_outcome() {
        let store = FakeStore {
            unreachable: true,
            ..Default::default()
        };
        let prices = FakePrices::with_prices(&[]);
        let (cmd_tx, mut event_rx) = spawn_aggregator(store, prices);

        cmd_tx.send(AggregatorCommand::Refresh).await.unwrap();
        let outcome = wait_completed(&mut event_rx).await;

        // nothing was ever fetched, the published outcome is still empty
        assert_eq!(outcome.tracked, 0);
        assert!(outcome.tickers.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_stale_generation_outcome_is_discarded() {
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (event_tx, _event_rx) = broadcast::channel(64);
        let mut aggregator = Aggregator::new(
            FakeStore::default(),
            FakePrices::with_prices(&[]),
            Session::new("user-1", None),
            Currency::Cad,
            cmd_rx,
            event_tx,
        );

        // a second refresh superseded the first one
        aggregator.generation = 2;
        aggregator.expected = 1;

        aggregator.apply_outcome(LookupOutcome {
            generation: 1,
            ticker: TrackedTicker::new(RecordId::new("k1"), "bitcoin"),
            result: Ok(CoinDetail {
                id: "bitcoin".to_string(),
                name: "bitcoin".to_string(),
                image_url: String::new(),
                price: dec!(91000),
            }),
        });

        assert!(aggregator.tickers.is_empty());
        assert_eq!(aggregator.settled, 0);

        aggregator.apply_outcome(LookupOutcome {
            generation: 2,
            ticker: TrackedTicker::new(RecordId::new("k2"), "ethereum"),
            result: Ok(CoinDetail {
                id: "ethereum".to_string(),
                name: "ethereum".to_string(),
                image_url: String::new(),
                price: dec!(4500),
            }),
        });

        assert_eq!(aggregator.tickers.len(), 1);
        assert_eq!(aggregator.settled, 1);
    }
}
