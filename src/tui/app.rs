use std::time::Duration;

use anyhow::Result;
use crossterm::event::{Event, EventStream, KeyCode};
use futures_util::StreamExt;
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};
use tokio::sync::{broadcast, mpsc};

use crate::{
    aggregator::{AggregatorCommand, AggregatorEvent},
    currency::Currency,
    session::Session,
    ticker::EnrichedTicker,
    AppEvent,
};

pub struct App {
    should_quit: bool,
    rx: broadcast::Receiver<AppEvent>,
    tx_cmd: mpsc::Sender<AggregatorCommand>,
    email: String,
    currency: Currency,
    tickers: Vec<EnrichedTicker>,
    selected: Option<usize>,
    alert: Option<String>,
    pending_delete: Option<usize>,
    refreshing: bool,
}

impl App {
    pub fn new(
        rx: broadcast::Receiver<AppEvent>,
        tx_cmd: mpsc::Sender<AggregatorCommand>,
        session: &Session,
        currency: Currency,
    ) -> Self {
        Self {
            should_quit: false,
            rx,
            tx_cmd,
            email: session.email.clone().unwrap_or_else(|| session.uid.clone()),
            currency,
            tickers: vec![],
            selected: None,
            alert: None,
            pending_delete: None,
            refreshing: true,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = ratatui::init();
        let _ = terminal.clear();

        let mut events = EventStream::new();

        let period = Duration::from_secs_f64(1.0 / 20.0);
        let mut interval = tokio::time::interval(period);

        while !self.should_quit {
            tokio::select! {
                _ = interval.tick() => { terminal.draw(|frame| self.render(frame))?; },
                Some(Ok(event)) = events.next() => self.handle_events(event),
                event = self.rx.recv() => {
                    if let Ok(event) = event {
                        self.handle_app_events(event)
                    }
                }
            }
        }

        Ok(())
    }

    fn handle_app_events(&mut self, event: AppEvent) {
        match event {
            AppEvent::Aggregator(AggregatorEvent::Snapshot(tickers)) => {
                self.tickers = tickers;
                self.clamp_selection();
            }
            AppEvent::Aggregator(AggregatorEvent::LookupFailed(failure)) => {
                self.alert = Some(format!("{} : {}", failure.symbol, failure.message));
            }
            AppEvent::Aggregator(AggregatorEvent::RefreshCompleted(outcome)) => {
                self.tickers = outcome.tickers;
                self.clamp_selection();
                self.refreshing = false;
            }
        }
    }

    fn handle_events(&mut self, event: Event) {
        if let Some(key) = event.as_key_press_event() {
            match key.code {
                KeyCode::Char('q') => self.should_quit = true,
                KeyCode::Char('r') => {
                    self.alert = None;
                    self.pending_delete = None;
                    self.refreshing = true;
                    let _ = self.tx_cmd.try_send(AggregatorCommand::Refresh);
                }
                KeyCode::Up => self.select_previous(),
                KeyCode::Down => self.select_next(),
                KeyCode::Char('d') => {
                    if let Some(index) = self.selected {
                        self.pending_delete = Some(index);
                    }
                }
                KeyCode::Char('y') => {
                    let key = self
                        .pending_delete
                        .take()
                        .and_then(|i| self.tickers.get(i))
                        .map(|ticker| ticker.key.clone());
                    if let Some(key) = key {
                        self.alert = None;
                        self.refreshing = true;
                        let _ = self
                            .tx_cmd
                            .try_send(AggregatorCommand::DeleteTicker { key });
                    }
                }
                KeyCode::Char('n') | KeyCode::Esc => self.pending_delete = None,
                _ => {}
            }
        }
    }

    fn select_previous(&mut self) {
        if self.tickers.is_empty() {
            self.selected = None;
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) => index.saturating_sub(1),
            None => self.tickers.len() - 1,
        });
    }

    fn select_next(&mut self) {
        if self.tickers.is_empty() {
            self.selected = None;
            return;
        }
        self.selected = Some(match self.selected {
            Some(index) => (index + 1).min(self.tickers.len() - 1),
            None => 0,
        });
    }

    fn clamp_selection(&mut self) {
        self.selected = match (self.selected, self.tickers.len()) {
            (_, 0) => None,
            (Some(index), len) => Some(index.min(len - 1)),
            (None, _) => None,
        };
        // the list may have changed under a pending confirmation
        if self
            .pending_delete
            .is_some_and(|index| index >= self.tickers.len())
        {
            self.pending_delete = None;
        }
    }

    fn render(&self, frame: &mut Frame) {
        let [header_area, main_area, footer_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Fill(1),
            Constraint::Length(3),
        ])
        .areas(frame.area());

        self.render_header(frame, header_area);
        self.render_tickers(frame, main_area);
        self.render_footer(frame, footer_area);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title("Crypto Tracker").borders(Borders::ALL);
        let status = if self.refreshing { " (refreshing...)" } else { "" };
        let line = Line::from(vec![
            Span::styled(self.email.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(self.currency.label(), Style::default().fg(Color::Yellow)),
            Span::raw(status),
        ]);
        let p = Paragraph::new(line).block(block);
        frame.render_widget(p, area);
    }

    fn render_tickers(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().title("Tickers").borders(Borders::ALL);

        if self.tickers.is_empty() {
            let message = if self.refreshing {
                "Loading..."
            } else {
                "No tracked tickers"
            };
            let p = Paragraph::new(Line::from(message)).block(block);
            frame.render_widget(p, area);
            return;
        }

        let items: Vec<ListItem> = self
            .tickers
            .iter()
            .enumerate()
            .map(|(index, ticker)| {
                let item = ticker_item(ticker, self.currency);
                if Some(index) == self.selected {
                    item.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    item
                }
            })
            .collect();
        let list = List::new(items).block(block);
        frame.render_widget(list, area);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL);
        let line = match (&self.alert, self.pending_delete) {
            (_, Some(index)) => {
                let symbol = self
                    .tickers
                    .get(index)
                    .map(|t| t.symbol.as_str())
                    .unwrap_or("?");
                Line::from(Span::styled(
                    format!("Delete {} ? 'y' to confirm, 'n' to cancel", symbol),
                    Style::default().fg(Color::Red),
                ))
            }
            (Some(alert), None) => Line::from(Span::styled(
                alert.clone(),
                Style::default().fg(Color::Red),
            )),
            (None, None) => Line::from("'r' refresh / 'd' delete / up-down select / 'q' quit"),
        };
        let p = Paragraph::new(line).block(block);
        frame.render_widget(p, area);
    }
}

fn ticker_item(ticker: &EnrichedTicker, currency: Currency) -> ListItem<'static> {
    let top_line = Line::from(vec![
        Span::styled(ticker.symbol.clone(), Style::new().fg(Color::Blue)),
        Span::raw(" "),
        Span::styled(
            format!("{} {}", ticker.price, currency.code()),
            Style::default().fg(Color::Yellow),
        ),
    ]);
    let bot_line = Line::from(Span::raw(format!("{} ({})", ticker.id, ticker.key)));
    ListItem::new(vec![top_line, bot_line])
}
