//! Pluggable production and consumption schedules.
//!
//! A [`Role`] is ticked once per trader tick, after trade results are applied
//! and before offers are generated. It only touches the trader through
//! [`RoleContext`], which exposes the two inventory primitives plus a few reads.

use rand::Rng;

use super::inventory::TransferMode;
use super::trader::Trader;
use crate::types::{Price, Quantity, TraderId};

pub trait Role: Send {
    fn tick_role(&mut self, ctx: &mut RoleContext<'_>);

    /// Label used in logs when the trader carrying this role dies.
    fn name(&self) -> &str {
        "role"
    }
}

/// A role that never produces or consumes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleRole;

impl Role for IdleRole {
    fn tick_role(&mut self, _ctx: &mut RoleContext<'_>) {}

    fn name(&self) -> &str {
        "idle"
    }
}

/// Mutable view of a trader handed to its role for one tick.
pub struct RoleContext<'a> {
    trader: &'a mut Trader,
}

impl<'a> RoleContext<'a> {
    pub(super) fn new(trader: &'a mut Trader) -> Self {
        Self { trader }
    }

    pub fn trader_id(&self) -> TraderId {
        self.trader.id()
    }

    pub fn age(&self) -> u64 {
        self.trader.age()
    }

    pub fn money(&self) -> f64 {
        self.trader.money()
    }

    pub fn query(&self, commodity: &str) -> Quantity {
        self.trader.inventory().query(commodity)
    }

    /// Cost accumulated since the last successful production run.
    pub fn production_cost(&self) -> f64 {
        self.trader.production_cost
    }

    /// True with the given probability. `>= 1` always fires, `<= 0` never does.
    pub fn roll(&mut self, probability: f64) -> bool {
        if probability >= 1.0 {
            return true;
        }
        if probability <= 0.0 || probability.is_nan() {
            return false;
        }
        self.trader.rng.random::<f64>() < probability
    }

    /// Add up to `amount` units with the given probability.
    ///
    /// New units are priced at the tracked production cost spread over
    /// `amount`, floored at the configured minimum, and the tracker resets.
    pub fn produce(&mut self, commodity: &str, amount: Quantity, probability: f64) -> Quantity {
        if amount == 0 || !self.roll(probability) {
            return 0;
        }
        let total = self
            .trader
            .production_cost
            .max(self.trader.config.min_production_cost);
        let unit_cost: Price = total / amount as f64;
        let added = self.trader.inventory.try_add(
            commodity,
            amount,
            Some(unit_cost),
            TransferMode::BestEffort,
        );
        if added > 0 {
            self.trader.production_cost = 0.0;
        }
        added
    }

    /// Remove up to `amount` units with the given probability, charging their
    /// cost basis to the production tracker.
    pub fn consume(&mut self, commodity: &str, amount: Quantity, probability: f64) -> Quantity {
        if amount == 0 || !self.roll(probability) {
            return 0;
        }
        let unit_cost = self.trader.inventory.query_cost(commodity);
        let taken = self
            .trader
            .inventory
            .try_take(commodity, amount, TransferMode::BestEffort);
        self.trader.production_cost += taken as f64 * unit_cost;
        taken
    }

    /// Fixed cost such as an idleness fine. May push money below zero.
    pub fn lose_money(&mut self, amount: f64) {
        self.trader.force_take_money(amount);
        self.trader.production_cost += amount;
    }
}
