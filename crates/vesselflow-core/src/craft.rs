//! All resource state of one craft.
//!
//! [`CraftResources`] owns the craft's ledgers (created on first access) and
//! the queue of recipes registered during the current step. Its
//! [`sync`](CraftResources::sync) closes the step: recipes run to a fixed
//! point, the queue is cleared, then every ledger synchronizes with storage.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::broker::BrokerId;
use crate::config::EngineConfig;
use crate::event::ResourceEvent;
use crate::ledger::ResourceLedger;
use crate::recipe::{Recipe, ResourceAccess, execute_recipes};
use crate::reservoir::CraftStorage;
use crate::warp::{WarpControl, apply_ceilings};

#[derive(Debug, Clone, Default)]
pub struct CraftResources {
    ledgers: BTreeMap<String, ResourceLedger>,
    recipes: Vec<Recipe>,
    cures: BTreeMap<String, f64>,
}

impl CraftResources {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Ledgers
    // -----------------------------------------------------------------------

    /// The ledger for `name`, created on first access.
    ///
    /// A ledger created here has not seen storage yet: `amount`, `capacity`
    /// and `level` read 0 until the next [`sync`](Self::sync). Registering
    /// `produce` / `consume` through it is fine; to read real contents
    /// mid-step use [`resource_in`](Self::resource_in).
    pub fn get_resource(&mut self, name: &str) -> &mut ResourceLedger {
        self.ledgers
            .entry(name.to_string())
            .or_insert_with(|| ResourceLedger::new(name))
    }

    /// The ledger for `name`, read from `storage` if it has not been synced
    /// yet.
    pub fn resource_in(
        &mut self,
        storage: &mut dyn CraftStorage,
        name: &str,
    ) -> &mut ResourceLedger {
        fetch_ledger(&mut self.ledgers, storage, name)
    }

    pub fn resource(&self, name: &str) -> Option<&ResourceLedger> {
        self.ledgers.get(name)
    }

    /// All ledgers, ordered by resource name.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceLedger> {
        self.ledgers.values()
    }

    pub fn produce(&mut self, name: &str, quantity: f64, broker: BrokerId) {
        self.get_resource(name).produce(quantity, broker);
    }

    pub fn consume(&mut self, name: &str, quantity: f64, broker: BrokerId) {
        self.get_resource(name).consume(quantity, broker);
    }

    // -----------------------------------------------------------------------
    // Recipes and cures
    // -----------------------------------------------------------------------

    pub fn add_recipe(&mut self, recipe: Recipe) {
        self.recipes.push(recipe);
    }

    /// Recipes queued for the current step.
    pub fn pending_recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    /// Cure amounts accumulated by executed recipes.
    pub fn cure_totals(&self) -> &BTreeMap<String, f64> {
        &self.cures
    }

    /// Hand accumulated cure amounts over to the host and reset them.
    pub fn take_cures(&mut self) -> BTreeMap<String, f64> {
        std::mem::take(&mut self.cures)
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Close the step: execute recipes, clear the queue, then synchronize
    /// every ledger. `warp_rate` is the host's current acceleration factor.
    pub fn sync(
        &mut self,
        storage: &mut dyn CraftStorage,
        elapsed_s: f64,
        warp_rate: f64,
        config: &EngineConfig,
    ) -> Vec<ResourceEvent> {
        let Self {
            ledgers,
            recipes,
            cures,
        } = self;

        // Ledgers created by produce/consume this step have not seen storage.
        for ledger in ledgers.values_mut().filter(|l| !l.is_synced()) {
            ledger.refresh(storage);
        }

        if !recipes.is_empty() {
            let mut access = SyncAccess {
                ledgers: &mut *ledgers,
                storage: &mut *storage,
                cures,
            };
            execute_recipes(recipes, &mut access, config.max_recipe_passes);
        }
        recipes.clear();

        let mut events = Vec::new();
        for ledger in ledgers.values_mut() {
            events.extend(ledger.sync(storage, elapsed_s, warp_rate, config));
        }
        events
    }

    /// [`sync`](Self::sync) against a live warp controller, applying any
    /// ceiling the ledgers report.
    pub fn sync_with_warp(
        &mut self,
        storage: &mut dyn CraftStorage,
        elapsed_s: f64,
        warp: &mut dyn WarpControl,
        config: &EngineConfig,
    ) -> Vec<ResourceEvent> {
        let events = self.sync(storage, elapsed_s, warp.current_rate(), config);
        apply_ceilings(&events, warp);
        events
    }
}

fn fetch_ledger<'a>(
    ledgers: &'a mut BTreeMap<String, ResourceLedger>,
    storage: &mut dyn CraftStorage,
    name: &str,
) -> &'a mut ResourceLedger {
    let ledger = match ledgers.entry(name.to_string()) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(ResourceLedger::new(name)),
    };
    if !ledger.is_synced() {
        ledger.refresh(storage);
    }
    ledger
}

/// Recipe view of a craft during sync. Ledgers first touched by a recipe
/// are read from storage before use.
struct SyncAccess<'a, 's> {
    ledgers: &'a mut BTreeMap<String, ResourceLedger>,
    storage: &'a mut (dyn CraftStorage + 's),
    cures: &'a mut BTreeMap<String, f64>,
}

impl ResourceAccess for SyncAccess<'_, '_> {
    fn resource(&mut self, name: &str) -> &mut ResourceLedger {
        fetch_ledger(self.ledgers, self.storage, name)
    }

    fn cure(&mut self, name: &str, quantity: f64) {
        *self.cures.entry(name.to_string()).or_insert(0.0) += quantity;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
