//! End-to-end scenarios through the public API of the core crate.

use vesselflow_core::broker::{BrokerCategory, BrokerRegistry};
use vesselflow_core::cache::{CraftId, ResourceCache};
use vesselflow_core::config::{EngineConfig, Format};
use vesselflow_core::craft::CraftResources;
use vesselflow_core::event::ResourceEvent;
use vesselflow_core::process::ProcessCatalog;
use vesselflow_core::recipe::Recipe;
use vesselflow_core::test_utils::*;
use vesselflow_core::warp::FixedWarp;

// ===========================================================================
// Ledger scenarios
// ===========================================================================

#[test]
fn charge_consumed_and_produced_in_one_step() {
    let mut registry = BrokerRegistry::new();
    let heater = registry.get_or_create("heater");
    let panel = registry.get_or_create_with("panel", BrokerCategory::SolarPanel, "Solar panel");

    let mut storage = VecStorage::new().with("Charge", 0, 50.0, 100.0);
    let mut craft = CraftResources::new();
    craft.consume("Charge", 30.0, heater);
    craft.produce("Charge", 10.0, panel);
    assert_close(craft.resource("Charge").unwrap().deferred(), -20.0);

    craft.sync(&mut storage, 1.0, 1.0, &EngineConfig::default());

    let charge = craft.resource("Charge").unwrap();
    assert_close(charge.amount(), 30.0);
    assert_close(charge.rate(), -20.0);
    assert_close(charge.level(), 0.3);
    assert_eq!(charge.deferred(), 0.0);

    let rates = charge.broker_rates();
    assert_eq!(rates[0].broker, heater);
    assert_eq!(rates[1].broker, panel);
}

#[test]
fn high_priority_drains_first_and_fills_last() {
    let mut storage = VecStorage::new()
        .with("Charge", 1, 10.0, 10.0)
        .with("Charge", 2, 10.0, 10.0)
        .with("Charge", 3, 10.0, 10.0);
    let config = EngineConfig::default();
    let mut craft = CraftResources::new();
    let broker = BrokerRegistry::new().get_or_create("load");

    craft.consume("Charge", 15.0, broker);
    craft.sync(&mut storage, 1.0, 1.0, &config);

    assert_close(storage.reservoir(0).amount, 10.0);
    assert_close(storage.reservoir(1).amount, 5.0);
    assert_close(storage.reservoir(2).amount, 0.0);

    craft.produce("Charge", 7.0, broker);
    craft.sync(&mut storage, 1.0, 1.0, &config);

    assert_close(storage.reservoir(0).amount, 10.0);
    assert_close(storage.reservoir(1).amount, 10.0);
    assert_close(storage.reservoir(2).amount, 2.0);
}

#[test]
fn multi_step_rates_follow_activity() {
    let mut storage = small_craft();
    let config = EngineConfig::default();
    let mut craft = CraftResources::new();
    let broker = BrokerRegistry::new().get_or_create("probe core");

    for _ in 0..10 {
        craft.consume("ElectricCharge", 5.0, broker);
        craft.sync(&mut storage, 0.5, 1.0, &config);
    }

    let ec = craft.resource("ElectricCharge").unwrap();
    assert_close(ec.amount(), 550.0);
    assert_close(ec.rate(), -10.0);
    assert_close(ec.depletion_time(), 55.0);
    // The priority 10 battery is drained first.
    assert_close(storage.reservoir(1).amount, 150.0);
}

// ===========================================================================
// Recipe scenarios
// ===========================================================================

#[test]
fn combined_input_prefers_primary() {
    let mut storage = VecStorage::new()
        .with("A", 0, 0.0, 100.0)
        .with("B", 0, 100.0, 100.0);
    let mut craft = CraftResources::new();
    let broker = BrokerRegistry::new().get_or_create("mixer");

    craft.add_recipe(Recipe::new(broker).combined_input("A", 2.0, "B", 1.0));
    craft.sync(&mut storage, 1.0, 1.0, &EngineConfig::default());

    assert_close(storage.amount_of("A"), 0.0);
    assert_close(storage.amount_of("B"), 99.0);
}

#[test]
fn ore_refinery_clamped_by_left() {
    let config = EngineConfig::default();
    let mut craft = CraftResources::new();
    let broker = BrokerRegistry::new().get_or_create("refinery");

    // One unit per step: 1 ore in, 2 fuel out.
    let mut storage = VecStorage::new()
        .with("Ore", 0, 5.0, 10.0)
        .with("Fuel", 0, 0.0, 100.0);
    craft.add_recipe(Recipe::new(broker).input("Ore", 1.0).output("Fuel", 2.0, false));
    craft.sync(&mut storage, 1.0, 1.0, &config);
    assert_close(storage.amount_of("Ore"), 4.0);
    assert_close(storage.amount_of("Fuel"), 2.0);

    // Scaled to the whole ore stock: 5 in, 10 out.
    craft.add_recipe(Recipe::new(broker).input("Ore", 4.0).output("Fuel", 8.0, false));
    craft.sync(&mut storage, 1.0, 1.0, &config);
    assert_close(storage.amount_of("Ore"), 0.0);
    assert_close(storage.amount_of("Fuel"), 10.0);
}

#[test]
fn recipes_chain_within_one_step() {
    let mut storage = small_craft();
    let mut craft = CraftResources::new();
    let mut registry = BrokerRegistry::new();

    let toml = r#"
        [[process]]
        name = "water_recycler"
        category = "eclss"
        inputs = [{ resource = "WasteWater", rate = 1.0 }, { resource = "ElectricCharge", rate = 2.0 }]
        outputs = [{ resource = "Water", rate = 0.9 }]

        [[process]]
        name = "crew"
        category = "crew"
        inputs = [{ resource = "Water", rate = 1.0 }]
        outputs = [{ resource = "WasteWater", rate = 1.0 }]
    "#;
    let catalog = ProcessCatalog::from_str_as(toml, Format::Toml).unwrap();

    // Recycler registered first although its input only appears once the
    // crew recipe runs.
    craft.add_recipe(catalog.instantiate("water_recycler", 1.0, 10.0, &mut registry).unwrap());
    craft.add_recipe(catalog.instantiate("crew", 1.0, 10.0, &mut registry).unwrap());
    craft.sync(&mut storage, 10.0, 1.0, &EngineConfig::default());

    assert_close(storage.amount_of("Water"), 80.0 - 10.0 + 9.0);
    assert_close(storage.amount_of("WasteWater"), 0.0);
    assert_close(storage.amount_of("ElectricCharge"), 600.0 - 20.0);
}

// ===========================================================================
// Cache
// ===========================================================================

#[test]
fn incoherent_producer_limits_warp_through_cache() {
    let config = EngineConfig::default();
    let mut cache = ResourceCache::new(config.clone());
    let mut warp = FixedWarp::new(10_000.0);
    let mut storage = small_craft();
    let craft = CraftId(7);

    cache.get(craft).get_resource("Oxygen");
    cache.sync(craft, &mut storage, 1.0, &mut warp);

    storage.reservoir_mut(2).amount += 1.0;
    let events = cache.sync(craft, &mut storage, 1.0, &mut warp);

    assert!(events.iter().any(|e| matches!(
        e,
        ResourceEvent::IncoherentProducer { resource, .. } if resource == "Oxygen"
    )));
    assert_eq!(warp.rate, config.coherency_warp_ceiling);
}
