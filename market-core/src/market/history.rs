use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Price, Volume};

use super::clearing::ClearingReport;

/// One clearing pass for one commodity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub pass: u64,
    /// Time since the auction house was created.
    pub elapsed: Duration,
    pub price: Price,
    pub volume: Volume,
    pub bids: Volume,
    pub asks: Volume,
}

/// Append-only price and volume log for a single commodity.
///
/// Every windowed query clamps to what is available: asking for more points
/// than exist is the same as asking for all of them, and a window of 0 is
/// treated as 1. An empty history answers 0 everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceHistory {
    points: Vec<HistoryPoint>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reference point recorded before any trading happens.
    pub fn seed(&mut self, price: Price, elapsed: Duration) {
        self.points.push(HistoryPoint {
            pass: 0,
            elapsed,
            price,
            volume: 0,
            bids: 0,
            asks: 0,
        });
    }

    /// Append the outcome of a pass. Without trades the last known price carries over.
    pub fn record(
        &mut self,
        pass: u64,
        elapsed: Duration,
        report: &ClearingReport,
    ) -> &HistoryPoint {
        let price = report.vwap().unwrap_or_else(|| self.most_recent_price());
        self.points.push(HistoryPoint {
            pass,
            elapsed,
            price,
            volume: report.volume,
            bids: report.bid_quantity,
            asks: report.ask_quantity,
        });
        &self.points[self.points.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[HistoryPoint] {
        &self.points
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.last()
    }

    // === WINDOWS ===

    /// The most recent `count` points.
    pub fn window(&self, count: usize) -> &[HistoryPoint] {
        let count = count.max(1).min(self.points.len());
        &self.points[self.points.len() - count..]
    }

    /// Points recorded no earlier than `span` before the latest one.
    pub fn window_over(&self, span: Duration) -> &[HistoryPoint] {
        let Some(latest) = self.points.last() else {
            return &[];
        };
        let cutoff = latest.elapsed.saturating_sub(span);
        let start = self.points.partition_point(|p| p.elapsed < cutoff);
        &self.points[start..]
    }

    // === AGGREGATES ===

    pub fn average_price(&self, window: usize) -> Price {
        mean(self.window(window), |p| p.price)
    }

    pub fn average_price_over(&self, span: Duration) -> Price {
        mean(self.window_over(span), |p| p.price)
    }

    pub fn average_bids(&self, window: usize) -> f64 {
        mean(self.window(window), |p| p.bids as f64)
    }

    pub fn average_asks(&self, window: usize) -> f64 {
        mean(self.window(window), |p| p.asks as f64)
    }

    pub fn average_trades(&self, window: usize) -> f64 {
        mean(self.window(window), |p| p.volume as f64)
    }

    pub fn most_recent_price(&self) -> Price {
        self.points.last().map_or(0.0, |p| p.price)
    }

    /// Percent change between the latest price and the one `window` points earlier.
    pub fn percent_change(&self, window: usize) -> f64 {
        let len = self.points.len();
        if len < 2 {
            return 0.0;
        }
        let back = window.max(1).min(len - 1);
        percent(self.points[len - 1 - back].price, self.points[len - 1].price)
    }

    /// Percent change between the latest price and the oldest one inside `span`.
    pub fn percent_change_over(&self, span: Duration) -> f64 {
        let points = self.window_over(span);
        match (points.first(), points.last()) {
            (Some(first), Some(last)) if points.len() > 1 => percent(first.price, last.price),
            _ => 0.0,
        }
    }
}

fn mean(points: &[HistoryPoint], value: impl Fn(&HistoryPoint) -> f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(value).sum::<f64>() / points.len() as f64
}

fn percent(previous: Price, current: Price) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    100.0 * (current - previous) / previous
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history(prices: &[Price]) -> PriceHistory {
        let mut h = PriceHistory::new();
        for (i, &price) in prices.iter().enumerate() {
            h.points.push(HistoryPoint {
                pass: i as u64 + 1,
                elapsed: Duration::from_millis(10 * (i as u64 + 1)),
                price,
                volume: i as Volume,
                bids: 2 * i as Volume,
                asks: 3,
            });
        }
        h
    }

    #[test]
    fn empty_history_answers_zero() {
        let h = PriceHistory::new();
        assert_eq!(h.average_price(15), 0.0);
        assert_eq!(h.average_trades(15), 0.0);
        assert_eq!(h.most_recent_price(), 0.0);
        assert_eq!(h.percent_change(1), 0.0);
        assert!(h.window_over(Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn oversized_window_clamps_to_length() {
        let h = history(&[10.0, 12.0, 14.0]);
        assert_eq!(h.average_price(100), h.average_price(3));
        assert!((h.average_price(100) - 12.0).abs() < 1e-9);
        assert_eq!(h.average_price(0), 14.0);
        assert_eq!(h.average_price(2), 13.0);
    }

    #[test]
    fn volume_and_book_depth_averages() {
        let h = history(&[1.0, 1.0, 1.0, 1.0]);
        // volumes 0,1,2,3 and bids 0,2,4,6
        assert_eq!(h.average_trades(2), 2.5);
        assert_eq!(h.average_bids(4), 3.0);
        assert_eq!(h.average_asks(4), 3.0);
    }

    #[test]
    fn percent_change_looks_back_by_points() {
        let h = history(&[10.0, 20.0, 15.0]);
        assert!((h.percent_change(1) - (-25.0)).abs() < 1e-9);
        assert!((h.percent_change(2) - 50.0).abs() < 1e-9);
        // clamped to the oldest point
        assert!((h.percent_change(50) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn percent_change_from_zero_price_is_zero() {
        let h = history(&[0.0, 5.0]);
        assert_eq!(h.percent_change(1), 0.0);
    }

    #[test]
    fn time_windows_cover_recent_span() {
        // points at 10, 20, 30, 40 ms
        let h = history(&[4.0, 8.0, 12.0, 16.0]);
        assert_eq!(h.window_over(Duration::from_millis(10)).len(), 2);
        assert_eq!(h.average_price_over(Duration::from_millis(10)), 14.0);
        assert_eq!(h.window_over(Duration::from_secs(5)).len(), 4);
        assert!((h.percent_change_over(Duration::from_millis(20)) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn record_carries_price_forward_without_trades() {
        let mut h = PriceHistory::new();
        h.seed(7.5, Duration::ZERO);

        let report = ClearingReport {
            commodity: "wood".into(),
            bid_quantity: 4,
            ..Default::default()
        };
        let point = h.record(1, Duration::from_millis(10), &report);
        assert_eq!(point.price, 7.5);
        assert_eq!(point.volume, 0);
        assert_eq!(point.bids, 4);
        assert_eq!(h.len(), 2);
    }
}
