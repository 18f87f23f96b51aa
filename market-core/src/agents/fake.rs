use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::mailbox::Mailbox;
use crate::market::AuctionHouse;
use crate::messages::{Message, Offer, Payload};
use crate::types::{Price, Quantity, TraderId, Volume};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// A scripted offer repeated every tick in `[start, start + duration)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shock {
    pub side: Side,
    pub commodity: String,
    pub quantity: Quantity,
    pub unit_price: Price,
    pub start: u64,
    pub duration: u64,
}

impl Shock {
    pub fn is_active(&self, tick: u64) -> bool {
        tick >= self.start && tick - self.start < self.duration
    }
}

/// Non-adaptive participant that injects synthetic demand and supply.
///
/// It holds no money or goods; fills are only counted.
pub struct FakeTrader {
    id: TraderId,
    house: Weak<AuctionHouse>,
    mailbox: Arc<Mailbox>,
    shocks: Vec<Shock>,
    ticks: u64,
    requested: bool,
    registered: bool,
    rejected: bool,
    bought: HashMap<String, Volume>,
    sold: HashMap<String, Volume>,
}

impl FakeTrader {
    pub fn new(id: TraderId, house: &Arc<AuctionHouse>) -> Self {
        Self {
            id,
            house: Arc::downgrade(house),
            mailbox: Mailbox::new(id),
            shocks: Vec::new(),
            ticks: 0,
            requested: false,
            registered: false,
            rejected: false,
            bought: HashMap::new(),
            sold: HashMap::new(),
        }
    }

    /// Bid for `quantity` every tick in `[start, start + duration)`.
    pub fn register_shortage(
        &mut self,
        commodity: impl Into<String>,
        quantity: Quantity,
        unit_price: Price,
        start: u64,
        duration: u64,
    ) {
        self.add_shock(Shock {
            side: Side::Bid,
            commodity: commodity.into(),
            quantity,
            unit_price,
            start,
            duration,
        });
    }

    /// Ask `quantity` every tick in `[start, start + duration)`.
    pub fn register_surplus(
        &mut self,
        commodity: impl Into<String>,
        quantity: Quantity,
        unit_price: Price,
        start: u64,
        duration: u64,
    ) {
        self.add_shock(Shock {
            side: Side::Ask,
            commodity: commodity.into(),
            quantity,
            unit_price,
            start,
            duration,
        });
    }

    /// Shocks with zero quantity or zero duration are dropped.
    fn add_shock(&mut self, shock: Shock) {
        if shock.quantity == 0 || shock.duration == 0 {
            tracing::debug!(trader = self.id, commodity = %shock.commodity, "empty shock ignored");
            return;
        }
        self.shocks.push(shock);
    }

    pub fn tick(&mut self) {
        let Some(house) = self.house.upgrade() else {
            return;
        };
        if !self.requested {
            house.receive_message(Message::register(self.id, Arc::downgrade(&self.mailbox)));
            self.requested = true;
        }

        for message in self.mailbox.drain() {
            tracing::debug!(trader = self.id, "recv: {message}");
            match message.into_payload() {
                Payload::RegisterResponse(response) if response.accepted => self.registered = true,
                Payload::RegisterResponse(response) => {
                    tracing::warn!(
                        trader = self.id,
                        reason = ?response.reason,
                        "fake trader rejected"
                    );
                    self.rejected = true;
                }
                Payload::BidResult(result) => {
                    *self.bought.entry(result.commodity).or_default() +=
                        Volume::from(result.quantity_traded);
                }
                Payload::AskResult(result) => {
                    *self.sold.entry(result.commodity).or_default() +=
                        Volume::from(result.quantity_traded);
                }
                _ => {}
            }
        }

        if self.registered {
            for shock in self.shocks.iter().filter(|s| s.is_active(self.ticks)) {
                let offer = Offer::new(
                    self.id,
                    shock.commodity.clone(),
                    shock.quantity,
                    shock.unit_price,
                );
                let message = match shock.side {
                    Side::Bid => Message::bid(offer),
                    Side::Ask => Message::ask(offer),
                };
                house.receive_message(message);
            }
        }
        self.ticks += 1;
    }

    pub fn id(&self) -> TraderId {
        self.id
    }

    pub fn age(&self) -> u64 {
        self.ticks
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    pub fn shocks(&self) -> &[Shock] {
        &self.shocks
    }

    pub fn bought(&self, commodity: &str) -> Volume {
        self.bought.get(commodity).copied().unwrap_or(0)
    }

    pub fn sold(&self, commodity: &str) -> Volume {
        self.sold.get(commodity).copied().unwrap_or(0)
    }
}

impl Drop for FakeTrader {
    fn drop(&mut self) {
        if !self.registered {
            return;
        }
        if let Some(house) = self.house.upgrade() {
            house.receive_message(Message::shutdown(self.id));
        }
    }
}
