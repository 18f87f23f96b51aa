use crate::messages::Offer;
use crate::types::{Price, Quantity, TraderId, Volume};

// === ORDER BOOK ===

/// Offers collected for one commodity during the current pass, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub bids: Vec<Offer>,
    pub asks: Vec<Offer>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bid(&mut self, offer: Offer) {
        self.bids.push(offer);
    }

    pub fn add_ask(&mut self, offer: Offer) {
        self.asks.push(offer);
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn bid_quantity(&self) -> Volume {
        self.bids.iter().map(|o| Volume::from(o.quantity)).sum()
    }

    pub fn ask_quantity(&self) -> Volume {
        self.asks.iter().map(|o| Volume::from(o.quantity)).sum()
    }
}

// === FILLS ===

/// One matched trade between a bid and an ask.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub buyer: TraderId,
    pub seller: TraderId,
    pub quantity: Quantity,
    /// Execution price (the ask price).
    pub price: Price,
    pub bid_price: Price,
}

impl Fill {
    /// What the matching engine keeps from this trade.
    pub fn spread(&self) -> f64 {
        self.quantity as f64 * (self.bid_price - self.price)
    }
}
