use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Commodity, Price, Quantity};

/// How a transfer behaves when it cannot be satisfied in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferMode {
    /// All or nothing.
    Atomic,
    /// Move as much as possible.
    BestEffort,
}

impl TransferMode {
    /// Amount to move given what was asked and what is possible.
    fn settle(self, requested: Quantity, possible: Quantity) -> Quantity {
        match self {
            _ if possible >= requested => requested,
            Self::Atomic => 0,
            Self::BestEffort => possible,
        }
    }
}

// === ITEMS ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub commodity: String,
    pub unit_size: f64,
    pub quantity: Quantity,
    pub target_min: Quantity,
    pub target_max: Quantity,
    /// Per-unit cost basis of the units currently held.
    pub cost: Price,
}

impl InventoryItem {
    pub fn new(commodity: &Commodity, quantity: Quantity) -> Self {
        Self {
            commodity: commodity.name.clone(),
            unit_size: commodity.unit_size,
            quantity,
            target_min: 0,
            target_max: 0,
            cost: 0.0,
        }
    }

    pub fn with_targets(mut self, min: Quantity, max: Quantity) -> Self {
        self.target_min = min;
        self.target_max = max.max(min);
        self
    }

    pub fn with_cost(mut self, cost: Price) -> Self {
        self.cost = cost;
        self
    }

    pub fn surplus(&self) -> Quantity {
        self.quantity.saturating_sub(self.target_max)
    }

    pub fn shortage(&self) -> Quantity {
        self.target_min.saturating_sub(self.quantity)
    }

    pub fn space(&self) -> f64 {
        self.quantity as f64 * self.unit_size
    }
}

// === INVENTORY ===

/// Capacity-bounded holding of one trader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub capacity: f64,
    items: BTreeMap<String, InventoryItem>,
}

impl Inventory {
    pub fn new(capacity: f64) -> Self {
        Self {
            capacity,
            items: BTreeMap::new(),
        }
    }

    /// Add a starting holding. Items that do not fit are truncated to capacity.
    pub fn with_item(mut self, mut item: InventoryItem) -> Self {
        if item.unit_size > 0.0 {
            let room = (self.empty_space() / item.unit_size).floor().max(0.0) as Quantity;
            item.quantity = item.quantity.min(room);
        }
        self.items.insert(item.commodity.clone(), item);
        self
    }

    pub fn used_space(&self) -> f64 {
        self.items.values().map(InventoryItem::space).sum()
    }

    pub fn empty_space(&self) -> f64 {
        (self.capacity - self.used_space()).max(0.0)
    }

    pub fn get(&self, commodity: &str) -> Option<&InventoryItem> {
        self.items.get(commodity)
    }

    pub fn contains(&self, commodity: &str) -> bool {
        self.items.contains_key(commodity)
    }

    pub fn query(&self, commodity: &str) -> Quantity {
        self.items.get(commodity).map_or(0, |i| i.quantity)
    }

    pub fn query_cost(&self, commodity: &str) -> Price {
        self.items.get(commodity).map_or(0.0, |i| i.cost)
    }

    pub fn unit_size(&self, commodity: &str) -> Option<f64> {
        self.items.get(commodity).map(|i| i.unit_size)
    }

    pub fn surplus(&self, commodity: &str) -> Quantity {
        self.items.get(commodity).map_or(0, InventoryItem::surplus)
    }

    pub fn shortage(&self, commodity: &str) -> Quantity {
        self.items.get(commodity).map_or(0, InventoryItem::shortage)
    }

    /// Whole units of `commodity` that still fit.
    pub fn room_for(&self, commodity: &str) -> Quantity {
        match self.unit_size(commodity) {
            Some(size) if size > 0.0 => (self.empty_space() / size).floor() as Quantity,
            Some(_) => Quantity::MAX - self.query(commodity),
            None => 0,
        }
    }

    /// Add units, folding `unit_price` into the cost basis when given.
    /// Returns the quantity actually added; unknown commodities add nothing.
    pub fn try_add(
        &mut self,
        commodity: &str,
        quantity: Quantity,
        unit_price: Option<Price>,
        mode: TransferMode,
    ) -> Quantity {
        let room = self.room_for(commodity);
        let Some(item) = self.items.get_mut(commodity) else {
            tracing::debug!(commodity, "add to unknown commodity ignored");
            return 0;
        };
        let added = mode.settle(quantity, room);
        if added == 0 {
            return 0;
        }
        if let Some(price) = unit_price {
            let held = item.quantity as f64;
            let incoming = added as f64;
            item.cost = (item.cost * held + price * incoming) / (held + incoming);
        }
        item.quantity += added;
        added
    }

    /// Remove units. Returns the quantity actually removed.
    pub fn try_take(
        &mut self,
        commodity: &str,
        quantity: Quantity,
        mode: TransferMode,
    ) -> Quantity {
        let Some(item) = self.items.get_mut(commodity) else {
            tracing::debug!(commodity, "take from unknown commodity ignored");
            return 0;
        };
        let taken = mode.settle(quantity, item.quantity);
        item.quantity -= taken;
        taken
    }

    pub fn set_cost(&mut self, commodity: &str, cost: Price) {
        if let Some(item) = self.items.get_mut(commodity) {
            item.cost = cost;
        }
    }

    pub fn commodities(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = &InventoryItem> {
        self.items.values()
    }

    /// Drop every unit held. Targets and cost basis stay.
    pub fn clear(&mut self) {
        for item in self.items.values_mut() {
            item.quantity = 0;
        }
    }
}
