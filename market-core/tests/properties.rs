use std::collections::HashMap;
use std::sync::Arc;

use market_core::{
    AuctionHouse, Commodity, EngineConfig, Mailbox, Message, Offer, OrderBook, Payload, TraderId,
    clear_book,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_book(rng: &mut StdRng, bids: usize, asks: usize) -> OrderBook {
    let mut book = OrderBook::new();
    let mut id: TraderId = 1;
    for _ in 0..bids {
        let qty = rng.random_range(1..20);
        let price = rng.random_range(1.0..20.0);
        book.add_bid(Offer::new(id, "grain", qty, price));
        id += 1;
    }
    for _ in 0..asks {
        let qty = rng.random_range(1..20);
        let price = rng.random_range(1.0..20.0);
        book.add_ask(Offer::new(id, "grain", qty, price));
        id += 1;
    }
    book
}

#[test]
fn property_fills_sum_to_reported_traded_quantity() {
    let mut rng = StdRng::seed_from_u64(42);

    for trial in 0..200 {
        let bids = rng.random_range(0..8);
        let asks = rng.random_range(0..8);
        let book = random_book(&mut rng, bids, asks);
        let report = clear_book("grain", book);

        let mut filled: HashMap<TraderId, u32> = HashMap::new();
        for fill in &report.fills {
            assert!(fill.bid_price >= fill.price, "trial {trial}: non-crossing fill");
            *filled.entry(fill.buyer).or_default() += fill.quantity;
            *filled.entry(fill.seller).or_default() += fill.quantity;
        }

        assert_eq!(report.bid_results.len(), bids, "trial {trial}: one result per bid");
        assert_eq!(report.ask_results.len(), asks, "trial {trial}: one result per ask");
        for result in report.bid_results.iter().chain(&report.ask_results) {
            let expected = filled.get(&result.sender_id).copied().unwrap_or(0);
            assert_eq!(
                result.quantity_traded, expected,
                "trial {trial}: trader {} traded {} but fills say {}",
                result.sender_id, result.quantity_traded, expected
            );
        }

        let spread: f64 = report
            .fills
            .iter()
            .map(|f| f.quantity as f64 * (f.bid_price - f.price))
            .sum();
        assert!((report.spread_profit - spread).abs() < 1e-9);
        assert!(report.spread_profit >= 0.0);
    }
}

#[test]
fn property_results_account_for_every_offered_unit() {
    let mut rng = StdRng::seed_from_u64(7);

    for trial in 0..200 {
        let book = random_book(&mut rng, 5, 5);
        let offered: HashMap<TraderId, u32> = book
            .bids
            .iter()
            .chain(&book.asks)
            .map(|o| (o.sender_id, o.quantity))
            .collect();
        let report = clear_book("grain", book);

        for result in report.bid_results.iter().chain(&report.ask_results) {
            assert_eq!(
                result.quantity_offered(),
                u64::from(offered[&result.sender_id]),
                "trial {trial}: trader {} lost units",
                result.sender_id
            );
            if result.quantity_traded > 0 {
                assert!(result.avg_price > 0.0);
            }
        }
    }
}

#[test]
fn property_after_clearing_the_book_no_longer_crosses() {
    let mut rng = StdRng::seed_from_u64(1234);

    for trial in 0..200 {
        let book = random_book(&mut rng, 6, 6);
        let report = clear_book("grain", book);

        let best_open_bid = report
            .bid_results
            .iter()
            .filter(|r| r.quantity_untraded > 0)
            .map(|r| r.unit_price)
            .fold(f64::NEG_INFINITY, f64::max);
        let best_open_ask = report
            .ask_results
            .iter()
            .filter(|r| r.quantity_untraded > 0)
            .map(|r| r.unit_price)
            .fold(f64::INFINITY, f64::min);
        assert!(
            best_open_bid < best_open_ask,
            "trial {trial}: leftover bid {best_open_bid} crosses leftover ask {best_open_ask}"
        );
    }
}

#[test]
fn property_every_registered_sender_gets_exactly_one_result_per_offer() {
    let mut rng = StdRng::seed_from_u64(99);
    let house = AuctionHouse::new(EngineConfig::default());
    house.register_commodity(Commodity::new("grain", 1.0)).unwrap();

    let mailboxes: Vec<Arc<Mailbox>> = (1..=10)
        .map(|id| {
            let mailbox = Mailbox::new(id);
            house.receive_message(Message::register(id, Arc::downgrade(&mailbox)));
            mailbox
        })
        .collect();
    house.clear_pass();
    for mailbox in &mailboxes {
        mailbox.drain();
    }

    for _ in 0..50 {
        let mut sent = HashMap::new();
        for mailbox in &mailboxes {
            let offers = rng.random_range(0..3);
            for _ in 0..offers {
                let offer = Offer::new(
                    mailbox.owner(),
                    "grain",
                    rng.random_range(1..10),
                    rng.random_range(5.0..15.0),
                );
                let message = if rng.random_bool(0.5) {
                    Message::bid(offer)
                } else {
                    Message::ask(offer)
                };
                house.receive_message(message);
            }
            sent.insert(mailbox.owner(), offers);
        }

        let pass = house.clear_pass();
        assert_eq!(pass.undeliverable, 0);
        for mailbox in &mailboxes {
            let received = mailbox
                .drain()
                .into_iter()
                .filter(|m| matches!(m.payload(), Payload::BidResult(_) | Payload::AskResult(_)))
                .count();
            assert_eq!(received, sent[&mailbox.owner()]);
        }
    }
}
