//! The seam between the engine and the host's storage representation.
//!
//! The host owns every reservoir. During a ledger sync the engine borrows
//! them through [`CraftStorage`], reads their contents into pooled
//! [`ReservoirWrapper`]s, distributes the step's delta, and writes the
//! changed amounts back. A live craft and a serialized background craft are
//! two implementations of the same trait; the engine never branches on which
//! one it has.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// A single storage location for one resource.
pub trait Reservoir {
    fn amount(&self) -> f64;
    fn set_amount(&mut self, amount: f64);
    fn capacity(&self) -> f64;
    fn set_capacity(&mut self, capacity: f64);

    /// Reservoirs with flow disabled are invisible to the engine.
    fn flow_enabled(&self) -> bool {
        true
    }
}

/// Enumerates the reservoirs of one craft.
///
/// `visit_reservoirs` must call `visitor` once per reservoir holding
/// `resource`, passing the reservoir's flow priority. The order must be
/// stable across two calls made within one sync with no mutation in
/// between: the engine reads in the first visit and writes back by ordinal
/// in the second.
pub trait CraftStorage {
    fn visit_reservoirs(
        &mut self,
        resource: &str,
        visitor: &mut dyn FnMut(i32, &mut dyn Reservoir),
    );
}

// ---------------------------------------------------------------------------
// Plain reservoir
// ---------------------------------------------------------------------------

/// A self-contained reservoir. Handy for hosts that keep storage as plain
/// data and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasicReservoir {
    pub amount: f64,
    pub capacity: f64,
    #[serde(default = "default_flow")]
    pub flow_enabled: bool,
}

fn default_flow() -> bool {
    true
}

impl BasicReservoir {
    pub fn new(amount: f64, capacity: f64) -> Self {
        debug_assert!(capacity >= 0.0, "negative reservoir capacity");
        Self {
            amount,
            capacity,
            flow_enabled: true,
        }
    }
}

impl Reservoir for BasicReservoir {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn set_amount(&mut self, amount: f64) {
        self.amount = amount;
    }

    fn capacity(&self) -> f64 {
        self.capacity
    }

    fn set_capacity(&mut self, capacity: f64) {
        self.capacity = capacity;
    }

    fn flow_enabled(&self) -> bool {
        self.flow_enabled
    }
}

// ---------------------------------------------------------------------------
// Pooled wrapper
// ---------------------------------------------------------------------------

/// Rounding noise tolerated on a host amount before `bind` complains.
const BIND_SLACK: f64 = 1e-6;

/// A pooled, re-bindable view of one host reservoir for the duration of a
/// sync.
///
/// `ordinal` is the reservoir's position in the storage enumeration; it is
/// how the write-back pass finds the underlying reservoir again.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReservoirWrapper {
    ordinal: usize,
    amount: f64,
    capacity: f64,
    dirty: bool,
}

impl ReservoirWrapper {
    /// Point this wrapper at a new reservoir, discarding previous state.
    ///
    /// The host must hand over `0 <= amount <= capacity`.
    pub fn bind(&mut self, ordinal: usize, amount: f64, capacity: f64) {
        debug_assert!(capacity >= 0.0, "negative reservoir capacity");
        debug_assert!(
            (-BIND_SLACK..=capacity + BIND_SLACK).contains(&amount),
            "reservoir {ordinal} holds {amount} outside [0, {capacity}]"
        );
        self.ordinal = ordinal;
        self.amount = amount;
        self.capacity = capacity;
        self.dirty = false;
    }

    /// Return the wrapper to its pristine state for reuse.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Whether the amount changed since the last bind.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Free space left in this reservoir.
    pub fn headroom(&self) -> f64 {
        (self.capacity - self.amount).max(0.0)
    }
}

impl Reservoir for ReservoirWrapper {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn set_amount(&mut self, amount: f64) {
        if amount != self.amount {
            self.amount = amount;
            self.dirty = true;
        }
    }

    fn capacity(&self) -> f64 {
        self.capacity
    }

    fn set_capacity(&mut self, capacity: f64) {
        self.capacity = capacity;
    }
}
