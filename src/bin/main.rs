use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use itertools::Itertools;
use strum::IntoEnumIterator;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypto_tracker::aggregator::{Aggregator, AggregatorCommand, AggregatorEvent, RefreshOutcome};
use crypto_tracker::currency::Currency;
use crypto_tracker::market::CoinGecko;
use crypto_tracker::session::Session;
use crypto_tracker::store::Store;
use crypto_tracker::ticker::RecordId;
use crypto_tracker::tui::app::App;
use crypto_tracker::AppEvent;

#[derive(Parser, Debug)]
struct Args {
    /// Base URL of the remote store
    #[arg(long, env = "TRACKER_STORE_URL")]
    store_url: String,
    /// User id owning the tracked tickers
    #[arg(long, env = "TRACKER_UID")]
    uid: String,
    #[arg(long, env = "TRACKER_EMAIL")]
    email: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Live view of the tracked tickers
    Watch,
    /// Run one refresh and print the result
    List {
        #[arg(long)]
        json: bool,
    },
    /// Delete a tracked ticker by record key, then refresh
    Delete {
        #[arg(long)]
        key: String,
    },
    /// Show or change the preferred display currency
    Currency {
        #[command(subcommand)]
        command: CurrencyCommands,
    },
}

#[derive(Debug, Subcommand)]
enum CurrencyCommands {
    Show,
    Set { code: String },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{}=info,crypto_tracker=info,reqwest=warn", env!("CARGO_CRATE_NAME")).into()
        }))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let session = Session::new(&args.uid, args.email.clone());
    let store = Store::new(&args.store_url);

    let result = match args.command {
        Commands::Watch => run_watch(store, session).await,
        Commands::List { json } => run_list(store, session, None, json).await,
        Commands::Delete { key } => {
            run_list(store, session, Some(RecordId::new(&key)), false).await
        }
        Commands::Currency { command } => match command {
            CurrencyCommands::Show => run_currency_show(store, session).await,
            CurrencyCommands::Set { code } => run_currency_set(store, session, &code).await,
        },
    };

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn current_currency(store: &Store, session: &Session) -> Currency {
    match store.current_currency_setting(session).await {
        Ok(setting) => setting.and_then(|s| s.as_currency()).unwrap_or_default(),
        Err(err) => {
            warn!("failed to read currency setting : {:#}", err);
            Currency::default()
        }
    }
}

async fn run_watch(store: Store, session: Session) -> Result<()> {
    let currency = current_currency(&store, &session).await;

    let (cmd_tx, cmd_rx) = mpsc::channel::<AggregatorCommand>(16);
    let (event_tx, event_rx) = broadcast::channel::<AppEvent>(256);

    let aggregator = Aggregator::new(
        store,
        CoinGecko::new(),
        session.clone(),
        currency,
        cmd_rx,
        event_tx,
    );
    let aggregator_task = tokio::task::spawn(aggregator.run());

    cmd_tx.send(AggregatorCommand::Refresh).await?;

    let mut app = App::new(event_rx, cmd_tx, &session, currency);
    let app_task = tokio::task::spawn(async move {
        let _ = app.run().await;
    });

    tokio::select! {
        _ = app_task => {}
        _ = aggregator_task => {}
    }

    ratatui::restore();

    Ok(())
}

async fn run_list(
    store: Store,
    session: Session,
    delete_key: Option<RecordId>,
    json: bool,
) -> Result<()> {
    let currency = current_currency(&store, &session).await;

    let (cmd_tx, cmd_rx) = mpsc::channel::<AggregatorCommand>(16);
    let (event_tx, mut event_rx) = broadcast::channel::<AppEvent>(256);

    let aggregator = Aggregator::new(store, CoinGecko::new(), session, currency, cmd_rx, event_tx);
    tokio::task::spawn(aggregator.run());

    let command = match delete_key {
        Some(key) => AggregatorCommand::DeleteTicker { key },
        None => AggregatorCommand::Refresh,
    };
    cmd_tx.send(command).await?;

    let outcome = loop {
        match event_rx.recv().await? {
            AppEvent::Aggregator(AggregatorEvent::LookupFailed(failure)) => {
                warn!("{} : {}", failure.symbol, failure.message);
            }
            AppEvent::Aggregator(AggregatorEvent::RefreshCompleted(outcome)) => break outcome,
            _ => {}
        }
    };

    if json {
        println!("{}", serde_json::ser::to_string_pretty(&outcome)?);
        return Ok(());
    }

    print_outcome(&outcome, currency);
    Ok(())
}

fn print_outcome(outcome: &RefreshOutcome, currency: Currency) {
    if outcome.tickers.is_empty() {
        println!("No tracked tickers.");
    }
    for ticker in &outcome.tickers {
        println!(
            "{} {} {}  id={} key={}",
            ticker.symbol.blue(),
            ticker.price.to_string().yellow(),
            currency.code(),
            ticker.id,
            ticker.key
        );
    }
    if !outcome.failures.is_empty() {
        println!(
            "{}",
            format!(
                "{} of {} lookups failed",
                outcome.failures.len(),
                outcome.tracked
            )
            .red()
        );
    }
}

async fn run_currency_show(store: Store, session: Session) -> Result<()> {
    match store.current_currency_setting(&session).await? {
        Some(setting) => println!("{}", setting.currency_label),
        None => println!(
            "No currency saved, defaulting to {}",
            Currency::default().label()
        ),
    }
    Ok(())
}

async fn run_currency_set(store: Store, session: Session, code: &str) -> Result<()> {
    let Some(currency) = Currency::from_code(code) else {
        anyhow::bail!(
            "unknown currency {:?}, valid codes : {}",
            code,
            Currency::iter().map(|c| c.code()).join(", ")
        );
    };

    let key = store.save_currency_setting(&session, currency).await?;
    info!("saved currency setting as {}", key);
    println!("Settings saved : {}", currency.label().green());
    Ok(())
}
