use std::collections::{HashMap, VecDeque};

use crate::types::{Price, Quantity};

/// Where `value` sits inside `[min, max]`, clamped to 0..=1.
///
/// A collapsed range (`min == max`) gives 0 below the point, 1 above it and
/// 0.5 exactly on it.
pub fn position_in_range(value: Price, min: Price, max: Price) -> f64 {
    if max <= min {
        return match value.partial_cmp(&min) {
            Some(std::cmp::Ordering::Less) => 0.0,
            Some(std::cmp::Ordering::Greater) => 1.0,
            _ => 0.5,
        };
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// How attractive `market` is for a buyer who has seen prices in `[min, max]`.
pub fn favorability(market: Price, min: Price, max: Price) -> f64 {
    1.0 - position_in_range(market, min, max)
}

/// A trader's private record of the prices it actually traded at.
#[derive(Debug, Clone)]
pub struct PriceBeliefs {
    lookback: usize,
    observed: HashMap<String, VecDeque<Price>>,
}

impl PriceBeliefs {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
            observed: HashMap::new(),
        }
    }

    /// Prime the range before any fills, e.g. from a known market price.
    pub fn seed(&mut self, commodity: &str, low: Price, high: Price) {
        let window = self.window_mut(commodity);
        window.clear();
        window.push_back(low);
        window.push_back(high);
    }

    /// Record `quantity` units filled at `price`, evicting the oldest beyond the lookback.
    pub fn observe(&mut self, commodity: &str, quantity: Quantity, price: Price) {
        let lookback = self.lookback;
        let window = self.window_mut(commodity);
        for _ in 0..quantity.min(lookback as Quantity) {
            if window.len() == lookback {
                window.pop_front();
            }
            window.push_back(price);
        }
    }

    /// `(min, max)` of the observed prices, `None` before the first observation.
    pub fn range(&self, commodity: &str) -> Option<(Price, Price)> {
        let window = self.observed.get(commodity)?;
        let first = *window.front()?;
        Some(
            window
                .iter()
                .fold((first, first), |(lo, hi), &p| (lo.min(p), hi.max(p))),
        )
    }

    pub fn observations(&self, commodity: &str) -> usize {
        self.observed.get(commodity).map_or(0, VecDeque::len)
    }

    fn window_mut(&mut self, commodity: &str) -> &mut VecDeque<Price> {
        let lookback = self.lookback;
        self.observed
            .entry(commodity.to_string())
            .or_insert_with(|| VecDeque::with_capacity(lookback))
    }
}
