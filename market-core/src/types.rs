// Core ID types, aliases and the commodity catalog entry

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

// === TYPE ALIASES ===

pub type TraderId = u32;
pub type Price = f64;
pub type Quantity = u32;
/// Quantity summed over many offers or passes.
pub type Volume = u64;

/// Sender id used by the auction house for every message it emits.
pub const AUCTION_HOUSE_ID: TraderId = 0;

// === HANDLES ===

new_key_type! {
    /// Generational handle into the simulation's trader table.
    pub struct TraderKey;
}

// === COMMODITY ===

/// A tradeable good. `unit_size` is the inventory space one unit occupies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub name: String,
    pub unit_size: f64,
}

impl Commodity {
    pub fn new(name: impl Into<String>, unit_size: f64) -> Self {
        Self {
            name: name.into(),
            unit_size,
        }
    }
}
