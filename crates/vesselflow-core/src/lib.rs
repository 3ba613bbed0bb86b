//! Vesselflow Core -- deferred resource bookkeeping for simulated craft.
//!
//! This crate owns the resource flow of a craft built from many storage
//! reservoirs (power, propellant, atmosphere, consumables). Producers and
//! consumers never touch storage directly: they register deferred requests
//! during a step, and the engine resolves everything at the end of the step.
//! The same logic runs whether the host drives a fully detailed ("loaded")
//! craft or a serialized background ("unloaded") one.
//!
//! # Step Pipeline
//!
//! Each call to [`craft::CraftResources::sync`] closes one simulation step:
//!
//! 1. **Register** -- domain code calls `produce` / `consume` / `add_recipe`
//!    during the step. These only touch in-memory ledgers.
//! 2. **Recipes** -- every queued [`recipe::Recipe`] runs to a fixed point so
//!    one recipe's output can feed another's input within the same step.
//! 3. **Synchronize** -- every [`ledger::ResourceLedger`] clamps its deferred
//!    delta and distributes it across reservoirs by flow priority.
//! 4. **Report** -- ledgers recompute amount, level, rate and per-broker
//!    attribution, and emit [`event::ResourceEvent`]s on transitions.
//!
//! # Key Types
//!
//! - [`broker::BrokerRegistry`] -- deduplicated attribution tags.
//! - [`reservoir::Reservoir`] / [`reservoir::CraftStorage`] -- the seam to
//!   the host's storage representation.
//! - [`tank::PriorityTanks`] -- reservoirs grouped by priority, drained from
//!   the top and filled from the bottom.
//! - [`ledger::ResourceLedger`] -- per-resource deferred ledger.
//! - [`recipe::Recipe`] -- weighted input/output conversion rule.
//! - [`cache::ResourceCache`] -- craft id to [`craft::CraftResources`].

pub mod broker;
pub mod cache;
pub mod config;
pub mod craft;
pub mod event;
pub mod ledger;
pub mod process;
pub mod recipe;
pub mod reservoir;
pub mod tank;
pub mod warp;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Quantities below this magnitude are treated as zero by the ledger.
pub const AMOUNT_EPSILON: f64 = 1e-10;

/// Minimal recipe progress (fraction of one execution) counted as work done.
pub const RECIPE_EPSILON: f64 = 1e-12;
