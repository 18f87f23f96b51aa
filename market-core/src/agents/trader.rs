use std::sync::{Arc, Weak};

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::inventory::{Inventory, TransferMode};
use super::mailbox::Mailbox;
use super::pricing::{PriceBeliefs, favorability};
use super::role::{Role, RoleContext};
use crate::config::TraderConfig;
use crate::market::AuctionHouse;
use crate::messages::{Message, Offer, Payload, RegisterResponse, TradeResult};
use crate::types::{Price, Quantity, TraderId};

/// An adaptive market participant.
///
/// Each tick it folds in the results of its last offers, runs its role, and
/// quotes new offers from its inventory targets. Asks are priced off its own
/// cost basis; bids off the public average price, sized by how cheap that
/// price looks against the range the trader has itself traded in.
pub struct Trader {
    id: TraderId,
    class_name: String,
    money: f64,
    money_last_round: f64,
    pub(super) inventory: Inventory,
    house: Weak<AuctionHouse>,
    mailbox: Arc<Mailbox>,
    outbox: Vec<Message>,
    role: Option<Box<dyn Role>>,
    beliefs: PriceBeliefs,
    pub(super) config: TraderConfig,
    pub(super) rng: StdRng,
    pub(super) production_cost: f64,
    initialised: bool,
    destroyed: bool,
    ticks: u64,
}

impl Trader {
    /// Build a trader and queue its registration request.
    ///
    /// Commodities the auction house already has a price for start with a
    /// belief range of `[price, 3 * price]`, and with that price as cost basis
    /// when none was given.
    pub fn new(
        id: TraderId,
        class_name: impl Into<String>,
        house: &Arc<AuctionHouse>,
        money: f64,
        mut inventory: Inventory,
        config: TraderConfig,
    ) -> Self {
        let mut beliefs = PriceBeliefs::new(config.internal_lookback);
        let commodities: Vec<String> = inventory.commodities().map(str::to_owned).collect();
        for commodity in &commodities {
            let price = house.average_historical_price(commodity, config.external_lookback);
            if price > 0.0 {
                beliefs.seed(commodity, price, 3.0 * price);
                if inventory.query_cost(commodity) == 0.0 {
                    inventory.set_cost(commodity, price);
                }
            }
        }

        let mailbox = Mailbox::new(id);
        let register = Message::register(id, Arc::downgrade(&mailbox));
        let seed = config.seed ^ u64::from(id).wrapping_mul(0x9E37_79B9_7F4A_7C15);

        Self {
            id,
            class_name: class_name.into(),
            money,
            money_last_round: money,
            inventory,
            house: Arc::downgrade(house),
            mailbox,
            outbox: vec![register],
            role: None,
            beliefs,
            rng: StdRng::seed_from_u64(seed),
            config,
            production_cost: 0.0,
            initialised: false,
            destroyed: false,
            ticks: 0,
        }
    }

    pub fn with_role(mut self, role: impl Role + 'static) -> Self {
        self.role = Some(Box::new(role));
        self
    }

    // === TICK ===

    pub fn tick(&mut self) {
        if self.destroyed {
            return;
        }
        self.money_last_round = self.money;
        self.flush_inbox();

        if self.initialised && !self.destroyed {
            if let Some(mut role) = self.role.take() {
                role.tick_role(&mut RoleContext::new(self));
                self.role = Some(role);
            }
            self.generate_offers();
        }

        if self.money < 0.0 && !self.destroyed {
            tracing::warn!(trader = self.id, money = self.money, "bankrupt");
            self.destroy();
        }

        self.flush_outbox();
        if self.initialised {
            self.ticks += 1;
        }
    }

    fn flush_inbox(&mut self) {
        for message in self.mailbox.drain() {
            if self.destroyed {
                break;
            }
            tracing::debug!(trader = self.id, "recv: {message}");
            match message.into_payload() {
                Payload::BidResult(result) => self.settle_bid(&result),
                Payload::AskResult(result) => self.settle_ask(&result),
                Payload::RegisterResponse(response) => self.handle_registration(&response),
                other => {
                    tracing::debug!(trader = self.id, kind = other.kind(), "ignored message")
                }
            }
        }
    }

    fn flush_outbox(&mut self) {
        if self.outbox.is_empty() {
            return;
        }
        let Some(house) = self.house.upgrade() else {
            tracing::debug!(trader = self.id, "auction house gone, dropping outbox");
            self.outbox.clear();
            return;
        };
        for message in self.outbox.drain(..) {
            tracing::debug!(trader = self.id, "send: {message}");
            house.receive_message(message);
        }
    }

    fn handle_registration(&mut self, response: &RegisterResponse) {
        if response.trader_id != self.id {
            return;
        }
        if response.accepted {
            self.initialised = true;
            self.log_lifecycle("registered");
        } else {
            tracing::warn!(
                trader = self.id,
                reason = response.reason.as_deref().unwrap_or(""),
                "registration rejected"
            );
            self.log_lifecycle("rejected");
            self.destroy();
        }
    }

    // === SETTLEMENT ===

    /// Goods arrive at the bid's cost; the buyer pays its own bid price per unit.
    fn settle_bid(&mut self, result: &TradeResult) {
        if result.quantity_traded == 0 {
            return;
        }
        self.beliefs
            .observe(&result.commodity, result.quantity_traded, result.avg_price);
        let added = self.inventory.try_add(
            &result.commodity,
            result.quantity_traded,
            Some(result.unit_price),
            TransferMode::BestEffort,
        );
        if added < result.quantity_traded {
            tracing::debug!(
                trader = self.id,
                commodity = %result.commodity,
                lost = result.quantity_traded - added,
                "bought more than fits"
            );
        }
        self.force_take_money(result.quantity_traded as f64 * result.unit_price);
    }

    fn settle_ask(&mut self, result: &TradeResult) {
        if result.quantity_traded == 0 {
            return;
        }
        self.beliefs
            .observe(&result.commodity, result.quantity_traded, result.avg_price);
        self.inventory.try_take(
            &result.commodity,
            result.quantity_traded,
            TransferMode::BestEffort,
        );
        self.add_money(result.quantity_traded as f64 * result.avg_price);
    }

    // === OFFERS ===

    fn generate_offers(&mut self) {
        let commodities: Vec<String> = self.inventory.commodities().map(str::to_owned).collect();
        for commodity in &commodities {
            if let Some(ask) = self.create_ask(commodity) {
                self.outbox.push(Message::ask(ask));
            } else if let Some(bid) = self.create_bid(commodity) {
                self.outbox.push(Message::bid(bid));
            }
        }
    }

    /// Offer the surplus above target max at cost basis plus markup.
    pub fn create_ask(&self, commodity: &str) -> Option<Offer> {
        let quantity = self.inventory.surplus(commodity);
        if quantity == 0 {
            return None;
        }
        let price = (self.inventory.query_cost(commodity) * self.config.ask_markup)
            .max(self.config.min_price);
        Some(Offer::new(self.id, commodity, quantity, price))
    }

    /// Bid for part of the shortage below target min at the market price plus markup.
    pub fn create_bid(&self, commodity: &str) -> Option<Offer> {
        let shortage = self.inventory.shortage(commodity);
        if shortage == 0 {
            return None;
        }
        let house = self.house.upgrade()?;
        let market = house.average_historical_price(commodity, self.config.external_lookback);
        let quantity = self.determine_buy_quantity(commodity, market, shortage);
        if quantity == 0 {
            return None;
        }
        let price = (market * self.config.bid_markup).max(self.config.min_price);
        Some(Offer::new(self.id, commodity, quantity, price))
    }

    /// `floor(favorability * shortage)`, capped by free space. Zero until the
    /// trader has a belief range for the commodity.
    pub fn determine_buy_quantity(
        &self,
        commodity: &str,
        market: Price,
        shortage: Quantity,
    ) -> Quantity {
        let Some((low, high)) = self.beliefs.range(commodity) else {
            tracing::warn!(
                trader = self.id,
                commodity,
                "no observed trading range, abstaining from bid"
            );
            return 0;
        };
        let wanted = (favorability(market, low, high) * shortage as f64).floor() as Quantity;
        wanted.min(self.inventory.room_for(commodity))
    }

    // === MONEY & GOODS ===

    /// Take up to `amount`. Returns what was actually taken.
    pub fn try_take_money(&mut self, amount: f64, mode: TransferMode) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let taken = if self.money >= amount {
            amount
        } else {
            match mode {
                TransferMode::Atomic => 0.0,
                TransferMode::BestEffort => self.money.max(0.0),
            }
        };
        self.money -= taken;
        taken
    }

    pub fn force_take_money(&mut self, amount: f64) {
        self.money -= amount;
    }

    pub fn add_money(&mut self, amount: f64) {
        self.money += amount;
    }

    pub fn has_money(&self, amount: f64) -> bool {
        self.money >= amount
    }

    pub fn has_commodity(&self, commodity: &str, quantity: Quantity) -> bool {
        self.inventory.query(commodity) >= quantity
    }

    pub fn try_take_commodity(
        &mut self,
        commodity: &str,
        quantity: Quantity,
        mode: TransferMode,
    ) -> Quantity {
        self.inventory.try_take(commodity, quantity, mode)
    }

    pub fn try_add_commodity(
        &mut self,
        commodity: &str,
        quantity: Quantity,
        unit_price: Option<Price>,
        mode: TransferMode,
    ) -> Quantity {
        self.inventory.try_add(commodity, quantity, unit_price, mode)
    }

    // === LIFECYCLE ===

    /// Withdraw from the market and drop all goods. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.outbox.clear();
        self.notify_shutdown();
        self.inventory.clear();
        self.log_lifecycle("destroyed");
    }

    fn notify_shutdown(&self) {
        if !self.initialised {
            return;
        }
        if let Some(house) = self.house.upgrade() {
            house.receive_message(Message::shutdown(self.id));
        }
    }

    fn log_lifecycle(&self, event: &str) {
        tracing::info!(
            target: "agent",
            trader = self.id,
            class = %self.class_name,
            event,
            money = self.money,
            age = self.ticks,
        );
    }

    // === ACCESSORS ===

    pub fn id(&self) -> TraderId {
        self.id
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn money(&self) -> f64 {
        self.money
    }

    /// Money gained since the start of the current tick.
    pub fn profit(&self) -> f64 {
        self.money - self.money_last_round
    }

    /// Ticks taken since registration was accepted.
    pub fn age(&self) -> u64 {
        self.ticks
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn beliefs(&self) -> &PriceBeliefs {
        &self.beliefs
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }

    pub fn role_name(&self) -> &str {
        self.role.as_deref().map_or("none", |role| role.name())
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

impl Drop for Trader {
    fn drop(&mut self) {
        if !self.destroyed {
            self.notify_shutdown();
        }
    }
}
