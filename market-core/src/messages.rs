//! Envelope exchanged between traders and the auction house.
//!
//! A [`Message`] carries a sender id and exactly one [`Payload`]. It starts out
//! empty; the first payload attached sticks and later attaches are ignored.

use std::fmt;
use std::sync::Weak;

use serde::{Deserialize, Serialize};

use crate::agents::Mailbox;
use crate::types::{Price, Quantity, TraderId, Volume};

// === OFFERS ===

/// A bid or an ask, depending on the payload variant carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub sender_id: TraderId,
    pub commodity: String,
    pub quantity: Quantity,
    pub unit_price: Price,
}

impl Offer {
    pub fn new(
        sender_id: TraderId,
        commodity: impl Into<String>,
        quantity: Quantity,
        unit_price: Price,
    ) -> Self {
        Self {
            sender_id,
            commodity: commodity.into(),
            quantity,
            unit_price,
        }
    }
}

// === RESULTS ===

/// Outcome of one offer after a clearing pass.
///
/// `avg_price` is the volume-weighted trade price over all fills;
/// `unit_price` echoes the limit price of the offer it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub sender_id: TraderId,
    pub commodity: String,
    pub quantity_traded: Quantity,
    pub quantity_untraded: Quantity,
    pub avg_price: Price,
    pub unit_price: Price,
}

impl TradeResult {
    pub fn for_offer(offer: &Offer) -> Self {
        Self {
            sender_id: offer.sender_id,
            commodity: offer.commodity.clone(),
            quantity_traded: 0,
            quantity_untraded: 0,
            avg_price: 0.0,
            unit_price: offer.unit_price,
        }
    }

    /// Fold one fill into the running volume-weighted average.
    pub fn record_trade(&mut self, quantity: Quantity, price: Price) {
        if quantity == 0 {
            return;
        }
        let traded = self.quantity_traded as f64;
        let added = quantity as f64;
        self.avg_price = (self.avg_price * traded + price * added) / (traded + added);
        self.quantity_traded += quantity;
    }

    pub fn record_untraded(&mut self, remainder: Quantity) {
        self.quantity_untraded += remainder;
    }

    pub fn quantity_offered(&self) -> Volume {
        Volume::from(self.quantity_traded) + Volume::from(self.quantity_untraded)
    }
}

// === REGISTRATION ===

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub trader_id: TraderId,
    /// Where the auction house delivers replies and results.
    pub mailbox: Weak<Mailbox>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub trader_id: TraderId,
    pub accepted: bool,
    pub reason: Option<String>,
}

impl RegisterResponse {
    pub fn accepted(trader_id: TraderId) -> Self {
        Self {
            trader_id,
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(trader_id: TraderId, reason: impl Into<String>) -> Self {
        Self {
            trader_id,
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownNotify {
    pub trader_id: TraderId,
}

// === ENVELOPE ===

#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    RegisterRequest(RegisterRequest),
    RegisterResponse(RegisterResponse),
    BidOffer(Offer),
    AskOffer(Offer),
    BidResult(TradeResult),
    AskResult(TradeResult),
    ShutdownNotify(ShutdownNotify),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::RegisterRequest(_) => "register request",
            Self::RegisterResponse(_) => "register response",
            Self::BidOffer(_) => "bid offer",
            Self::AskOffer(_) => "ask offer",
            Self::BidResult(_) => "bid result",
            Self::AskResult(_) => "ask result",
            Self::ShutdownNotify(_) => "shutdown notify",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub sender_id: TraderId,
    payload: Payload,
}

impl Message {
    pub fn new(sender_id: TraderId) -> Self {
        Self {
            sender_id,
            payload: Payload::Empty,
        }
    }

    /// Attach a payload. Only the first attach on an empty message takes effect.
    pub fn attach(mut self, payload: Payload) -> Self {
        if self.is_empty() {
            self.payload = payload;
        }
        self
    }

    pub fn bid(offer: Offer) -> Self {
        Self::new(offer.sender_id).attach(Payload::BidOffer(offer))
    }

    pub fn ask(offer: Offer) -> Self {
        Self::new(offer.sender_id).attach(Payload::AskOffer(offer))
    }

    pub fn register(trader_id: TraderId, mailbox: Weak<Mailbox>) -> Self {
        Self::new(trader_id).attach(Payload::RegisterRequest(RegisterRequest {
            trader_id,
            mailbox,
        }))
    }

    pub fn shutdown(trader_id: TraderId) -> Self {
        Self::new(trader_id).attach(Payload::ShutdownNotify(ShutdownNotify { trader_id }))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.payload, Payload::Empty)
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }
}

// === TRACE STRINGS ===

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x{} @ ${:.2}",
            self.commodity, self.quantity, self.unit_price
        )
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Empty => write!(f, "Empty message from {}", self.sender_id),
            Payload::RegisterRequest(req) => write!(f, "RegisterRequest from {}", req.trader_id),
            Payload::RegisterResponse(resp) => {
                write!(f, "RegisterResponse for {}: ", resp.trader_id)?;
                match (resp.accepted, &resp.reason) {
                    (true, _) => write!(f, "OK"),
                    (false, Some(reason)) => write!(f, "FAILED - {reason}"),
                    (false, None) => write!(f, "FAILED"),
                }
            }
            Payload::BidOffer(offer) => write!(f, "BID from {}: {offer}", offer.sender_id),
            Payload::AskOffer(offer) => write!(f, "ASK from {}: {offer}", offer.sender_id),
            Payload::BidResult(r) => write!(
                f,
                "BID RESULT for {}: Bought {} x{} @ avg price ${:.2} ({}/{} bought)",
                r.sender_id,
                r.commodity,
                r.quantity_traded,
                r.avg_price,
                r.quantity_traded,
                r.quantity_offered()
            ),
            Payload::AskResult(r) => write!(
                f,
                "ASK RESULT for {}: Sold {} x{} @ avg price ${:.2} ({}/{} sold)",
                r.sender_id,
                r.commodity,
                r.quantity_traded,
                r.avg_price,
                r.quantity_traded,
                r.quantity_offered()
            ),
            Payload::ShutdownNotify(n) => write!(f, "ShutdownNotify from {}", n.trader_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attach_wins() {
        let msg = Message::new(3)
            .attach(Payload::BidOffer(Offer::new(3, "wood", 2, 5.0)))
            .attach(Payload::ShutdownNotify(ShutdownNotify { trader_id: 3 }));

        match msg.payload() {
            Payload::BidOffer(offer) => assert_eq!(offer.quantity, 2),
            other => panic!("expected bid offer, got {}", other.kind()),
        }
    }

    #[test]
    fn new_message_is_empty() {
        let msg = Message::new(1);
        assert!(msg.is_empty());
        assert_eq!(msg.to_string(), "Empty message from 1");
    }

    #[test]
    fn result_averages_by_volume() {
        let offer = Offer::new(1, "food", 10, 12.0);
        let mut result = TradeResult::for_offer(&offer);
        result.record_trade(3, 10.0);
        result.record_trade(1, 14.0);
        result.record_untraded(6);

        assert_eq!(result.quantity_traded, 4);
        assert_eq!(result.quantity_untraded, 6);
        assert!((result.avg_price - 11.0).abs() < 1e-9);
        assert_eq!(result.unit_price, 12.0);
        assert_eq!(result.quantity_offered(), 10);
    }

    #[test]
    fn zero_quantity_fill_leaves_average_untouched() {
        let mut result = TradeResult::for_offer(&Offer::new(1, "food", 1, 2.0));
        result.record_trade(0, 99.0);
        assert_eq!(result.quantity_traded, 0);
        assert_eq!(result.avg_price, 0.0);
    }

    #[test]
    fn trace_strings() {
        let bid = Message::bid(Offer::new(4, "ore", 5, 12.0));
        assert_eq!(bid.to_string(), "BID from 4: ore x5 @ $12.00");

        let rejected = Message::new(0).attach(Payload::RegisterResponse(
            RegisterResponse::rejected(7, "duplicate id"),
        ));
        assert_eq!(
            rejected.to_string(),
            "RegisterResponse for 7: FAILED - duplicate id"
        );

        let mut result = TradeResult::for_offer(&Offer::new(2, "wood", 3, 10.0));
        result.record_trade(3, 10.0);
        let msg = Message::new(0).attach(Payload::AskResult(result));
        assert_eq!(
            msg.to_string(),
            "ASK RESULT for 2: Sold wood x3 @ avg price $10.00 (3/3 sold)"
        );
    }
}
