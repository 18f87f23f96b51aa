//! Small two-good economy run under the table recorder.

use std::sync::Arc;

use market_core::instrument::TableRecorder;
use market_core::{
    AuctionHouse, Commodity, EngineConfig, Inventory, InventoryItem, Role, RoleContext,
    Simulation, Trader, TraderConfig,
};

/// Needs wood to farm; fined when idle.
struct Farmer;

impl Role for Farmer {
    fn tick_role(&mut self, ctx: &mut RoleContext<'_>) {
        if ctx.query("wood") > 0 {
            ctx.consume("wood", 1, 0.5);
            ctx.produce("food", 3, 1.0);
        } else {
            ctx.lose_money(0.5);
        }
    }

    fn name(&self) -> &str {
        "farmer"
    }
}

/// Needs food to cut wood; fined when idle.
struct Woodcutter;

impl Role for Woodcutter {
    fn tick_role(&mut self, ctx: &mut RoleContext<'_>) {
        if ctx.query("food") > 0 {
            ctx.consume("food", 1, 1.0);
            ctx.produce("wood", 2, 1.0);
        } else {
            ctx.lose_money(0.5);
        }
    }

    fn name(&self) -> &str {
        "woodcutter"
    }
}

fn spawn_trader(sim: &mut Simulation, farmer: bool, seed: u64) -> Trader {
    let id = sim.next_trader_id();
    let house = Arc::clone(sim.house());
    let food = Commodity::new("food", 0.5);
    let wood = Commodity::new("wood", 1.0);
    let config = TraderConfig::default().with_seed(seed);
    if farmer {
        let inventory = Inventory::new(30.0)
            .with_item(InventoryItem::new(&food, 4).with_targets(0, 3))
            .with_item(InventoryItem::new(&wood, 2).with_targets(3, 5));
        Trader::new(id, "farmer", &house, 50.0, inventory, config).with_role(Farmer)
    } else {
        let inventory = Inventory::new(30.0)
            .with_item(InventoryItem::new(&food, 2).with_targets(3, 5))
            .with_item(InventoryItem::new(&wood, 4).with_targets(0, 3));
        Trader::new(id, "woodcutter", &house, 50.0, inventory, config).with_role(Woodcutter)
    }
}

#[test]
fn economy_trades_and_records_every_pass() {
    let recorder = TableRecorder::new();
    const STEPS: u64 = 150;
    const POPULATION: usize = 10;

    let (sim, house) = tracing::subscriber::with_default(recorder.clone(), || {
        let house = AuctionHouse::new(EngineConfig::default());
        house
            .register_commodity_with_price(Commodity::new("food", 0.5), 2.0)
            .unwrap();
        house
            .register_commodity_with_price(Commodity::new("wood", 1.0), 4.0)
            .unwrap();

        let mut sim = Simulation::new(Arc::clone(&house));
        for i in 0..POPULATION {
            let trader = spawn_trader(&mut sim, i % 2 == 0, i as u64);
            sim.add_trader(trader);
        }

        for step in 0..STEPS {
            house.clear_pass();
            let report = sim.step();
            // churn: replace the dead with the same role, alternating by step
            for dead in report.died {
                let trader = spawn_trader(&mut sim, step % 2 == 0, 1_000 + step);
                sim.replace(dead, trader);
            }
        }
        (sim, house)
    });

    let clearing = recorder.table("clearing").expect("no clearing events");
    assert_eq!(clearing.rows() as u64, STEPS * 2);
    assert!(clearing.f64s("price").iter().all(|p| p.is_finite() && *p >= 0.0));

    let trades = recorder.table("trade").expect("no trade events");
    assert!(trades.rows() > 0);
    let traded: f64 = trades.f64s("quantity").iter().sum();
    let cleared: f64 = clearing.f64s("volume").iter().sum();
    assert_eq!(traded, cleared);

    let agents = recorder.table("agent").expect("no agent events");
    let registered = agents
        .strs("event")
        .iter()
        .filter(|e| e.as_str() == "registered")
        .count();
    assert!(registered >= POPULATION, "only {registered} registrations");

    assert_eq!(sim.alive_count(), POPULATION - sim.dead().count());
    for commodity in ["food", "wood"] {
        let price = house.average_historical_price(commodity, 15);
        assert!(price > 0.0, "{commodity} price collapsed to {price}");
    }
}
