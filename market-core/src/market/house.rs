use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use super::clearing::{ClearingReport, clear_book};
use super::history::PriceHistory;
use super::orders::OrderBook;
use crate::agents::Mailbox;
use crate::config::EngineConfig;
use crate::error::MarketError;
use crate::messages::{Message, Offer, Payload, RegisterRequest, RegisterResponse};
use crate::types::{AUCTION_HOUSE_ID, Commodity, Price, TraderId};

/// What one clearing pass did, per commodity in catalog order.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub pass: u64,
    pub reports: Vec<ClearingReport>,
    /// Results handed to a live mailbox.
    pub delivered: usize,
    /// Results addressed to unknown or dropped traders.
    pub undeliverable: usize,
}

impl PassReport {
    pub fn report(&self, commodity: &str) -> Option<&ClearingReport> {
        self.reports.iter().find(|r| r.commodity == commodity)
    }
}

/// State only the clearing context mutates.
#[derive(Default)]
struct HouseState {
    books: HashMap<String, OrderBook>,
    registry: HashMap<TraderId, Weak<Mailbox>>,
    spread_profit: f64,
    passes: u64,
}

// ============================================================================
// Auction house
// ============================================================================

/// Continuous double auction over a fixed commodity catalog.
///
/// Any thread may call [`receive_message`](Self::receive_message). Messages
/// wait in a pending queue until the next [`clear_pass`](Self::clear_pass),
/// which dispatches them, clears every book, appends history and routes
/// results back to the senders' mailboxes. [`tick`](Self::tick) repeats that
/// on a fixed cadence until its deadline or [`shutdown`](Self::shutdown).
pub struct AuctionHouse {
    config: EngineConfig,
    started: Instant,
    pending: Mutex<Vec<Message>>,
    state: Mutex<HouseState>,
    catalog: RwLock<BTreeMap<String, Commodity>>,
    history: RwLock<HashMap<String, PriceHistory>>,
    stopped: AtomicBool,
    signal: Mutex<()>,
    wake: Condvar,
}

impl AuctionHouse {
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            started: Instant::now(),
            pending: Mutex::new(Vec::new()),
            state: Mutex::new(HouseState::default()),
            catalog: RwLock::new(BTreeMap::new()),
            history: RwLock::new(HashMap::new()),
            stopped: AtomicBool::new(false),
            signal: Mutex::new(()),
            wake: Condvar::new(),
        })
    }

    pub fn id(&self) -> TraderId {
        AUCTION_HOUSE_ID
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // === CATALOG ===

    pub fn register_commodity(&self, commodity: Commodity) -> Result<(), MarketError> {
        let name = commodity.name.clone();
        {
            let mut catalog = self.catalog.write();
            if catalog.contains_key(&name) {
                let err = MarketError::DuplicateCommodity(name);
                tracing::warn!("{err}");
                return Err(err);
            }
            catalog.insert(name.clone(), commodity);
        }
        self.history.write().entry(name.clone()).or_default();
        self.state.lock().books.entry(name).or_default();
        Ok(())
    }

    /// Register and record `price` as the opening reference point.
    pub fn register_commodity_with_price(
        &self,
        commodity: Commodity,
        price: Price,
    ) -> Result<(), MarketError> {
        let name = commodity.name.clone();
        self.register_commodity(commodity)?;
        if let Some(history) = self.history.write().get_mut(&name) {
            history.seed(price, self.started.elapsed());
        }
        Ok(())
    }

    pub fn commodities(&self) -> Vec<Commodity> {
        self.catalog.read().values().cloned().collect()
    }

    // === MESSAGES ===

    /// Queue a message for the next clearing pass. Dropped once shut down.
    pub fn receive_message(&self, message: Message) {
        if self.is_stopped() {
            tracing::warn!(error = %MarketError::EngineStopped, "dropped: {message}");
            return;
        }
        self.pending.lock().push(message);
    }

    fn dispatch(&self, state: &mut HouseState, message: Message) -> Result<(), MarketError> {
        match message.into_payload() {
            Payload::RegisterRequest(request) => register_trader(state, request),
            Payload::BidOffer(offer) => {
                validate_offer(&offer)?;
                book_for(state, &offer.commodity)?.add_bid(offer);
                Ok(())
            }
            Payload::AskOffer(offer) => {
                validate_offer(&offer)?;
                book_for(state, &offer.commodity)?.add_ask(offer);
                Ok(())
            }
            Payload::ShutdownNotify(notice) => {
                state.registry.remove(&notice.trader_id);
                tracing::debug!(trader = notice.trader_id, "unregistered");
                Ok(())
            }
            other => Err(MarketError::UnexpectedMessage { kind: other.kind() }),
        }
    }

    // === CLEARING ===

    /// Drain pending messages, clear every commodity once and deliver results.
    pub fn clear_pass(&self) -> PassReport {
        let commodities: Vec<String> = self.catalog.read().keys().cloned().collect();
        let messages = std::mem::take(&mut *self.pending.lock());

        let mut state = self.state.lock();
        for message in messages {
            tracing::debug!("recv: {message}");
            match self.dispatch(&mut state, message) {
                Ok(()) => {}
                Err(err @ MarketError::UnexpectedMessage { .. }) => tracing::debug!("{err}"),
                Err(err) => tracing::warn!("{err}"),
            }
        }

        // owners dropped without a shutdown notice
        let before = state.registry.len();
        state.registry.retain(|_, mailbox| mailbox.strong_count() > 0);
        let pruned = before - state.registry.len();
        if pruned > 0 {
            tracing::debug!(pruned, "dropped registrations without a live mailbox");
        }

        state.passes += 1;
        let pass = state.passes;
        let elapsed = self.started.elapsed();
        let mut reports = Vec::with_capacity(commodities.len());
        {
            let mut history = self.history.write();
            for commodity in &commodities {
                let book = state
                    .books
                    .get_mut(commodity)
                    .map(std::mem::take)
                    .unwrap_or_default();
                let report = clear_book(commodity, book);
                state.spread_profit += report.spread_profit;

                let point = history
                    .entry(commodity.clone())
                    .or_default()
                    .record(pass, elapsed, &report);
                tracing::info!(
                    target: "clearing",
                    pass,
                    commodity = commodity.as_str(),
                    price = point.price,
                    volume = report.volume,
                    bids = report.bid_quantity,
                    asks = report.ask_quantity,
                    spread = report.spread_profit,
                );
                for fill in &report.fills {
                    tracing::info!(
                        target: "trade",
                        pass,
                        commodity = commodity.as_str(),
                        buyer = fill.buyer,
                        seller = fill.seller,
                        quantity = fill.quantity,
                        price = fill.price,
                        bid_price = fill.bid_price,
                    );
                }
                reports.push(report);
            }
        }

        let (mut delivered, mut undeliverable) = (0, 0);
        for report in &reports {
            let bids = report.bid_results.iter().cloned().map(Payload::BidResult);
            let asks = report.ask_results.iter().cloned().map(Payload::AskResult);
            for payload in bids.chain(asks) {
                let to = match &payload {
                    Payload::BidResult(r) | Payload::AskResult(r) => r.sender_id,
                    _ => continue,
                };
                let message = Message::new(AUCTION_HOUSE_ID).attach(payload);
                if deliver(&state.registry, to, message) {
                    delivered += 1;
                } else {
                    undeliverable += 1;
                }
            }
        }

        PassReport {
            pass,
            reports,
            delivered,
            undeliverable,
        }
    }

    // === LOOP ===

    /// Clear on a fixed cadence until `duration` elapses or [`shutdown`](Self::shutdown).
    pub fn tick(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        let interval = self.config.tick_interval();
        tracing::debug!(?duration, ?interval, "auction house loop started");

        while !self.is_stopped() {
            let pass_started = Instant::now();
            self.clear_pass();
            if Instant::now() >= deadline {
                break;
            }

            let next = (pass_started + interval).min(deadline);
            let mut guard = self.signal.lock();
            while !self.is_stopped() && Instant::now() < next {
                if self.wake.wait_until(&mut guard, next).timed_out() {
                    break;
                }
            }
        }
        tracing::debug!(passes = self.pass_count(), "auction house loop finished");
    }

    /// Run [`tick`](Self::tick) on a dedicated thread under the caller's subscriber.
    pub fn spawn(self: &Arc<Self>, duration: Duration) -> std::io::Result<JoinHandle<()>> {
        let house = Arc::clone(self);
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());
        thread::Builder::new()
            .name("auction-house".to_string())
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || house.tick(duration)))
    }

    /// Stop the loop after its current pass. Idempotent.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let _guard = self.signal.lock();
        self.wake.notify_all();
        tracing::debug!("auction house shutting down");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    // === MARKET DATA ===

    fn with_history(&self, commodity: &str, query: impl FnOnce(&PriceHistory) -> f64) -> f64 {
        match self.history.read().get(commodity) {
            Some(history) => query(history),
            None => {
                tracing::warn!(commodity, "market data requested for unknown commodity");
                0.0
            }
        }
    }

    pub fn average_historical_price(&self, commodity: &str, window: usize) -> Price {
        self.with_history(commodity, |h| h.average_price(window))
    }

    pub fn average_historical_price_over(&self, commodity: &str, span: Duration) -> Price {
        self.with_history(commodity, |h| h.average_price_over(span))
    }

    pub fn average_historical_bids(&self, commodity: &str, window: usize) -> f64 {
        self.with_history(commodity, |h| h.average_bids(window))
    }

    pub fn average_historical_asks(&self, commodity: &str, window: usize) -> f64 {
        self.with_history(commodity, |h| h.average_asks(window))
    }

    pub fn average_historical_trades(&self, commodity: &str, window: usize) -> f64 {
        self.with_history(commodity, |h| h.average_trades(window))
    }

    pub fn most_recent_price(&self, commodity: &str) -> Price {
        self.with_history(commodity, PriceHistory::most_recent_price)
    }

    pub fn percent_price_change(&self, commodity: &str, window: usize) -> f64 {
        self.with_history(commodity, |h| h.percent_change(window))
    }

    pub fn percent_price_change_over(&self, commodity: &str, span: Duration) -> f64 {
        self.with_history(commodity, |h| h.percent_change_over(span))
    }

    /// Snapshot of one commodity's history.
    pub fn history(&self, commodity: &str) -> Option<PriceHistory> {
        self.history.read().get(commodity).cloned()
    }

    // === LEDGER & REGISTRY ===

    /// Total bid/ask spread captured so far.
    pub fn spread_profit(&self) -> f64 {
        self.state.lock().spread_profit
    }

    pub fn pass_count(&self) -> u64 {
        self.state.lock().passes
    }

    /// Registered and, as of the last pass, still holding a live mailbox.
    pub fn is_registered(&self, trader: TraderId) -> bool {
        self.state.lock().registry.contains_key(&trader)
    }

    pub fn registered_traders(&self) -> Vec<TraderId> {
        let mut ids: Vec<TraderId> = self.state.lock().registry.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

// === DISPATCH HELPERS ===

/// Accept a new id, or an id whose previous mailbox is gone.
fn register_trader(state: &mut HouseState, request: RegisterRequest) -> Result<(), MarketError> {
    let RegisterRequest { trader_id, mailbox } = request;
    let taken = state
        .registry
        .get(&trader_id)
        .is_some_and(|existing| existing.strong_count() > 0);

    let response = if taken {
        RegisterResponse::rejected(trader_id, "duplicate id")
    } else {
        state.registry.insert(trader_id, mailbox.clone());
        RegisterResponse::accepted(trader_id)
    };
    let accepted = response.accepted;

    // Reply to the requester directly; a rejected id has no registry entry of its own.
    if let Some(inbox) = mailbox.upgrade() {
        inbox.deliver(Message::new(AUCTION_HOUSE_ID).attach(Payload::RegisterResponse(response)));
    }
    tracing::info!(target: "agent", trader = trader_id, event = "register", accepted);

    if accepted {
        Ok(())
    } else {
        Err(MarketError::DuplicateTrader(trader_id))
    }
}

fn validate_offer(offer: &Offer) -> Result<(), MarketError> {
    if offer.quantity == 0 {
        return Err(MarketError::InvalidQuantity {
            sender: offer.sender_id,
            commodity: offer.commodity.clone(),
        });
    }
    if !offer.unit_price.is_finite() || offer.unit_price < 0.0 {
        return Err(MarketError::InvalidPrice {
            sender: offer.sender_id,
            commodity: offer.commodity.clone(),
            price: offer.unit_price,
        });
    }
    Ok(())
}

fn book_for<'a>(
    state: &'a mut HouseState,
    commodity: &str,
) -> Result<&'a mut OrderBook, MarketError> {
    state
        .books
        .get_mut(commodity)
        .ok_or_else(|| MarketError::UnknownCommodity(commodity.to_string()))
}

fn deliver(registry: &HashMap<TraderId, Weak<Mailbox>>, to: TraderId, message: Message) -> bool {
    match registry.get(&to).and_then(Weak::upgrade) {
        Some(mailbox) => {
            mailbox.deliver(message);
            true
        }
        None => {
            tracing::debug!(trader = to, "undeliverable: {message}");
            false
        }
    }
}
