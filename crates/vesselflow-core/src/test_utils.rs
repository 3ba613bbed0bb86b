//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::reservoir::{BasicReservoir, CraftStorage, Reservoir};

// ===========================================================================
// Float comparison
// ===========================================================================

/// Tolerance used by [`assert_close`].
pub const CLOSE_TOLERANCE: f64 = 1e-9;

#[track_caller]
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= CLOSE_TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

// ===========================================================================
// In-memory storage
// ===========================================================================

/// One reservoir of a [`VecStorage`].
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEntry {
    pub resource: String,
    pub priority: i32,
    pub reservoir: BasicReservoir,
}

/// Flat list of reservoirs, enumerated in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VecStorage {
    pub entries: Vec<StorageEntry>,
}

impl VecStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, resource: &str, priority: i32, amount: f64, capacity: f64) -> Self {
        self.add(resource, priority, amount, capacity);
        self
    }

    /// Add a reservoir with flow disabled.
    pub fn with_disabled(
        mut self,
        resource: &str,
        priority: i32,
        amount: f64,
        capacity: f64,
    ) -> Self {
        let index = self.add(resource, priority, amount, capacity);
        self.entries[index].reservoir.flow_enabled = false;
        self
    }

    /// Append a reservoir and return its index.
    pub fn add(&mut self, resource: &str, priority: i32, amount: f64, capacity: f64) -> usize {
        self.entries.push(StorageEntry {
            resource: resource.to_string(),
            priority,
            reservoir: BasicReservoir::new(amount, capacity),
        });
        self.entries.len() - 1
    }

    pub fn reservoir(&self, index: usize) -> &BasicReservoir {
        &self.entries[index].reservoir
    }

    pub fn reservoir_mut(&mut self, index: usize) -> &mut BasicReservoir {
        &mut self.entries[index].reservoir
    }

    /// Total amount of `resource` across all reservoirs, flow-disabled
    /// included.
    pub fn amount_of(&self, resource: &str) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.resource == resource)
            .map(|e| e.reservoir.amount)
            .sum()
    }

    pub fn capacity_of(&self, resource: &str) -> f64 {
        self.entries
            .iter()
            .filter(|e| e.resource == resource)
            .map(|e| e.reservoir.capacity)
            .sum()
    }
}

impl CraftStorage for VecStorage {
    fn visit_reservoirs(
        &mut self,
        resource: &str,
        visitor: &mut dyn FnMut(i32, &mut dyn Reservoir),
    ) {
        for entry in self.entries.iter_mut().filter(|e| e.resource == resource) {
            visitor(entry.priority, &mut entry.reservoir);
        }
    }
}

// ===========================================================================
// Craft builders
// ===========================================================================

/// A craft with `resources` resources named `R0..`, each stored in
/// `reservoirs` half-full reservoirs of capacity 100 spread over four
/// priorities.
pub fn build_large_storage(resources: usize, reservoirs: usize) -> VecStorage {
    let mut storage = VecStorage::new();
    for r in 0..resources {
        let name = format!("R{r}");
        for i in 0..reservoirs {
            storage.add(&name, (i % 4) as i32, 50.0, 100.0);
        }
    }
    storage
}

/// A typical small craft: batteries, life support and propellant.
pub fn small_craft() -> VecStorage {
    VecStorage::new()
        .with("ElectricCharge", 0, 400.0, 1000.0)
        .with("ElectricCharge", 10, 200.0, 200.0)
        .with("Oxygen", 0, 50.0, 100.0)
        .with("CarbonDioxide", 0, 0.0, 100.0)
        .with("Water", 0, 80.0, 100.0)
        .with("WasteWater", 0, 0.0, 100.0)
        .with("LiquidFuel", 0, 360.0, 360.0)
        .with("Oxidizer", 0, 440.0, 440.0)
}
