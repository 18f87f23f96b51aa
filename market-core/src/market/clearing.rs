use crate::messages::TradeResult;
use crate::types::{Price, Quantity, Volume};

use super::orders::{Fill, OrderBook};

// === SINGLE BOOK CLEARING ===

/// Everything one clearing pass produced for a commodity.
#[derive(Debug, Clone, Default)]
pub struct ClearingReport {
    pub commodity: String,
    pub fills: Vec<Fill>,
    /// One result per bid, in price priority order.
    pub bid_results: Vec<TradeResult>,
    /// One result per ask, in price priority order.
    pub ask_results: Vec<TradeResult>,
    pub spread_profit: f64,
    pub volume: Volume,
    pub bid_quantity: Volume,
    pub ask_quantity: Volume,
}

impl ClearingReport {
    /// Volume-weighted execution price, `None` when nothing traded.
    pub fn vwap(&self) -> Option<Price> {
        if self.volume == 0 {
            return None;
        }
        let value: f64 = self
            .fills
            .iter()
            .map(|f| f.quantity as f64 * f.price)
            .sum();
        Some(value / self.volume as f64)
    }
}

/// Match a book by walking the best bid against the best ask.
///
/// Bids are taken highest first and asks lowest first; equal prices keep their
/// arrival order. Every fill executes at the ask price and the bid/ask
/// difference is reported as `spread_profit`. Whatever is left on an offer
/// when the book stops crossing is reported as untraded.
pub fn clear_book(commodity: &str, book: OrderBook) -> ClearingReport {
    if book.is_empty() {
        return ClearingReport {
            commodity: commodity.to_string(),
            ..Default::default()
        };
    }
    let bid_quantity = book.bid_quantity();
    let ask_quantity = book.ask_quantity();
    let OrderBook { mut bids, mut asks } = book;

    // sort_by is stable, so ties stay in arrival order
    bids.sort_by(|a, b| b.unit_price.total_cmp(&a.unit_price));
    asks.sort_by(|a, b| a.unit_price.total_cmp(&b.unit_price));

    let mut bid_results: Vec<TradeResult> = bids.iter().map(TradeResult::for_offer).collect();
    let mut ask_results: Vec<TradeResult> = asks.iter().map(TradeResult::for_offer).collect();
    let mut bid_left: Vec<Quantity> = bids.iter().map(|o| o.quantity).collect();
    let mut ask_left: Vec<Quantity> = asks.iter().map(|o| o.quantity).collect();

    let mut fills = Vec::new();
    let mut spread_profit = 0.0;
    let mut volume: Volume = 0;

    let (mut b, mut a) = (0, 0);
    while b < bids.len() && a < asks.len() {
        // Skip exhausted or empty offers
        if bid_left[b] == 0 {
            b += 1;
            continue;
        }
        if ask_left[a] == 0 {
            a += 1;
            continue;
        }

        let bid = &bids[b];
        let ask = &asks[a];
        if bid.unit_price < ask.unit_price {
            break;
        }

        let quantity = bid_left[b].min(ask_left[a]);
        let fill = Fill {
            buyer: bid.sender_id,
            seller: ask.sender_id,
            quantity,
            price: ask.unit_price,
            bid_price: bid.unit_price,
        };

        spread_profit += fill.spread();
        volume += Volume::from(quantity);
        bid_results[b].record_trade(quantity, fill.price);
        ask_results[a].record_trade(quantity, fill.price);
        bid_left[b] -= quantity;
        ask_left[a] -= quantity;
        fills.push(fill);
    }

    for (result, left) in bid_results.iter_mut().zip(&bid_left) {
        result.record_untraded(*left);
    }
    for (result, left) in ask_results.iter_mut().zip(&ask_left) {
        result.record_untraded(*left);
    }

    ClearingReport {
        commodity: commodity.to_string(),
        fills,
        bid_results,
        ask_results,
        spread_profit,
        volume,
        bid_quantity,
        ask_quantity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Offer;

    fn book(bids: &[(u32, Quantity, Price)], asks: &[(u32, Quantity, Price)]) -> OrderBook {
        let mut book = OrderBook::new();
        for &(id, qty, price) in bids {
            book.add_bid(Offer::new(id, "wood", qty, price));
        }
        for &(id, qty, price) in asks {
            book.add_ask(Offer::new(id, "wood", qty, price));
        }
        book
    }

    fn result_for(results: &[TradeResult], id: u32) -> &TradeResult {
        results.iter().find(|r| r.sender_id == id).unwrap()
    }

    #[test]
    fn partial_fill_at_ask_price() {
        // A bids 5 @ 12, B asks 3 @ 10
        let report = clear_book("wood", book(&[(1, 5, 12.0)], &[(2, 3, 10.0)]));

        assert_eq!(report.volume, 3);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.fills[0].price, 10.0);
        assert!((report.spread_profit - 6.0).abs() < 1e-9);

        let a = result_for(&report.bid_results, 1);
        assert_eq!((a.quantity_traded, a.quantity_untraded), (3, 2));
        assert_eq!(a.avg_price, 10.0);

        let b = result_for(&report.ask_results, 2);
        assert_eq!((b.quantity_traded, b.quantity_untraded), (3, 0));
        assert_eq!(b.avg_price, 10.0);
    }

    #[test]
    fn no_cross_means_no_trades() {
        let report = clear_book("wood", book(&[(1, 4, 8.0)], &[(2, 4, 9.0)]));

        assert!(report.fills.is_empty());
        assert_eq!(report.volume, 0);
        assert_eq!(report.vwap(), None);
        assert_eq!(report.bid_results[0].quantity_untraded, 4);
        assert_eq!(report.ask_results[0].quantity_untraded, 4);
    }

    #[test]
    fn empty_book_produces_nothing() {
        let report = clear_book("wood", OrderBook::new());
        assert!(report.fills.is_empty());
        assert!(report.bid_results.is_empty());
        assert!(report.ask_results.is_empty());
        assert_eq!(report.spread_profit, 0.0);
    }

    #[test]
    fn one_sided_book_reports_everything_untraded() {
        let report = clear_book("wood", book(&[(1, 2, 5.0), (2, 3, 6.0)], &[]));
        assert_eq!(report.bid_results.len(), 2);
        assert!(report.bid_results.iter().all(|r| r.quantity_traded == 0));
        assert_eq!(report.bid_quantity, 5);
    }

    #[test]
    fn price_priority_then_arrival_order() {
        // Two bids at the same price: the earlier one fills first.
        let report = clear_book(
            "wood",
            book(&[(1, 2, 10.0), (2, 2, 11.0), (3, 2, 10.0)], &[(9, 3, 9.0)]),
        );

        let buyers: Vec<u32> = report.fills.iter().map(|f| f.buyer).collect();
        assert_eq!(buyers, vec![2, 1]);
        assert_eq!(result_for(&report.bid_results, 1).quantity_traded, 1);
        assert_eq!(result_for(&report.bid_results, 3).quantity_traded, 0);
    }

    #[test]
    fn walks_multiple_asks_and_averages() {
        let report = clear_book(
            "wood",
            book(&[(1, 6, 15.0)], &[(2, 2, 12.0), (3, 2, 10.0), (4, 5, 16.0)]),
        );

        let buyer = result_for(&report.bid_results, 1);
        assert_eq!(buyer.quantity_traded, 4);
        assert_eq!(buyer.quantity_untraded, 2);
        assert!((buyer.avg_price - 11.0).abs() < 1e-9);

        // 2 units at spread 5, 2 units at spread 3
        assert!((report.spread_profit - 16.0).abs() < 1e-9);
        assert_eq!(result_for(&report.ask_results, 4).quantity_untraded, 5);
        assert!((report.vwap().unwrap() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn traded_volume_balances_on_both_sides() {
        let report = clear_book(
            "wood",
            book(
                &[(1, 3, 20.0), (2, 7, 14.0), (3, 1, 9.0)],
                &[(4, 4, 8.0), (5, 4, 13.0), (6, 9, 15.0)],
            ),
        );

        let bought: Volume = report
            .bid_results
            .iter()
            .map(|r| Volume::from(r.quantity_traded))
            .sum();
        let sold: Volume = report
            .ask_results
            .iter()
            .map(|r| Volume::from(r.quantity_traded))
            .sum();
        assert_eq!(bought, sold);
        assert_eq!(bought, report.volume);
        assert!(report.fills.iter().all(|f| f.bid_price >= f.price));
    }

    #[test]
    fn totals_near_quantity_max_do_not_overflow() {
        let big = 3_000_000_000;
        let report = clear_book(
            "wood",
            book(&[(1, big, 5.0), (2, big, 6.0)], &[(3, Quantity::MAX, 4.0), (4, big, 4.5)]),
        );

        assert_eq!(report.bid_quantity, 6_000_000_000);
        assert_eq!(report.ask_quantity, Volume::from(Quantity::MAX) + 3_000_000_000);
        assert_eq!(report.volume, 6_000_000_000);
        for result in report.bid_results.iter().chain(&report.ask_results) {
            assert!(result.quantity_offered() >= 3_000_000_000);
        }
        // 4_294_967_295 units at 4.0, the rest at 4.5
        assert!(report.vwap().is_some_and(|p| p > 4.0 && p < 4.5));
    }
}
