use std::sync::Arc;

use slotmap::SlotMap;

use crate::agents::{FakeTrader, Trader};
use crate::market::AuctionHouse;
use crate::types::{AUCTION_HOUSE_ID, TraderId, TraderKey};

/// Outcome of one driver step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub step: u64,
    pub alive: usize,
    /// Traders that died during this step.
    pub died: Vec<TraderKey>,
}

/// Minimal driver: ticks every live trader once per step in a stable order.
///
/// Which trader replaces a dead one is left to the caller; see
/// [`Simulation::replace`].
pub struct Simulation {
    house: Arc<AuctionHouse>,
    traders: SlotMap<TraderKey, Trader>,
    order: Vec<TraderKey>,
    fake_traders: Vec<FakeTrader>,
    next_id: TraderId,
    step: u64,
}

impl Simulation {
    pub fn new(house: Arc<AuctionHouse>) -> Self {
        Self {
            house,
            traders: SlotMap::with_key(),
            order: Vec::new(),
            fake_traders: Vec::new(),
            next_id: AUCTION_HOUSE_ID + 1,
            step: 0,
        }
    }

    pub fn house(&self) -> &Arc<AuctionHouse> {
        &self.house
    }

    /// A trader id not handed out before.
    pub fn next_trader_id(&mut self) -> TraderId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Take ownership of a trader and tick it once so it sends its registration.
    pub fn add_trader(&mut self, trader: Trader) -> TraderKey {
        let key = self.insert(trader);
        self.order.push(key);
        key
    }

    pub fn add_fake_trader(&mut self, fake: FakeTrader) {
        self.next_id = self.next_id.max(fake.id() + 1);
        self.fake_traders.push(fake);
    }

    fn insert(&mut self, mut trader: Trader) -> TraderKey {
        self.next_id = self.next_id.max(trader.id() + 1);
        trader.tick();
        self.traders.insert(trader)
    }

    /// Tick fake traders, then every live trader in registration order.
    pub fn step(&mut self) -> StepReport {
        for fake in &mut self.fake_traders {
            fake.tick();
        }

        let mut died = Vec::new();
        for &key in &self.order {
            let Some(trader) = self.traders.get_mut(key) else {
                continue;
            };
            if trader.is_destroyed() {
                continue;
            }
            trader.tick();
            if trader.is_destroyed() {
                died.push(key);
            }
        }

        self.step += 1;
        StepReport {
            step: self.step,
            alive: self.alive_count(),
            died,
        }
    }

    /// Swap a dead trader for a fresh one at the same position in the tick order.
    ///
    /// Returns `None`, dropping `trader`, when `dead` is stale or still alive.
    pub fn replace(&mut self, dead: TraderKey, trader: Trader) -> Option<TraderKey> {
        if !self.traders.get(dead).is_some_and(Trader::is_destroyed) {
            tracing::warn!(new_trader = trader.id(), "replace target is alive or stale");
            return None;
        }
        let position = self.order.iter().position(|&k| k == dead)?;
        self.traders.remove(dead);
        let key = self.insert(trader);
        self.order[position] = key;
        Some(key)
    }

    pub fn get(&self, key: TraderKey) -> Option<&Trader> {
        self.traders.get(key)
    }

    pub fn get_mut(&mut self, key: TraderKey) -> Option<&mut Trader> {
        self.traders.get_mut(key)
    }

    pub fn alive(&self) -> impl Iterator<Item = (TraderKey, &Trader)> {
        self.order
            .iter()
            .filter_map(|&k| self.traders.get(k).map(|t| (k, t)))
            .filter(|(_, t)| !t.is_destroyed())
    }

    pub fn dead(&self) -> impl Iterator<Item = TraderKey> + '_ {
        self.order
            .iter()
            .copied()
            .filter(|&k| self.traders.get(k).is_some_and(Trader::is_destroyed))
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    pub fn fake_traders(&self) -> &[FakeTrader] {
        &self.fake_traders
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    /// Stop the auction house loop. Whoever spawned it still joins the handle.
    pub fn shutdown(&self) {
        self.house.shutdown();
    }
}
