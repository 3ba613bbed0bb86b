//! Host-side storage backings for the Vesselflow engine.
//!
//! The core engine only sees reservoirs through
//! [`CraftStorage`](vesselflow_core::reservoir::CraftStorage). This crate
//! provides the two representations a host typically keeps for a craft:
//!
//! - [`LiveCraft`] -- a loaded craft whose parts are objects mutated in place,
//!   keyed by generational [`PartId`]s so parts can come and go mid-flight.
//! - [`CraftSnapshot`] -- a serialized background craft. The engine writes
//!   straight into the snapshot, which the host persists as-is.
//!
//! A craft moves between the two with [`LiveCraft::to_snapshot`] and
//! [`LiveCraft::from_snapshot`]. Both enumerate reservoirs in the same order,
//! so a craft synced loaded or unloaded ends up in the same state.

pub mod live;
pub mod snapshot;

pub use live::{LiveCraft, Part, PartId, PartResource};
pub use snapshot::{CraftSnapshot, PartSnapshot, ResourceSnapshot};
