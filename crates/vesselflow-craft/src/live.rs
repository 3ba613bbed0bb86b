//! Loaded craft: parts held in a slotmap and mutated in place.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use vesselflow_core::reservoir::{CraftStorage, Reservoir};

use crate::snapshot::{CraftSnapshot, PartSnapshot, ResourceSnapshot};

new_key_type! {
    /// Identifies a part of a loaded craft.
    pub struct PartId;
}

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// One resource container on a part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartResource {
    pub name: String,
    pub amount: f64,
    pub max_amount: f64,
    /// Whether the container takes part in resource flow.
    pub flow_state: bool,
}

impl PartResource {
    pub fn new(name: impl Into<String>, amount: f64, max_amount: f64) -> Self {
        debug_assert!(max_amount >= 0.0, "negative container capacity");
        Self {
            name: name.into(),
            amount,
            max_amount,
            flow_state: true,
        }
    }
}

impl Reservoir for PartResource {
    fn amount(&self) -> f64 {
        self.amount
    }

    fn set_amount(&mut self, amount: f64) {
        self.amount = amount;
    }

    fn capacity(&self) -> f64 {
        self.max_amount
    }

    fn set_capacity(&mut self, capacity: f64) {
        self.max_amount = capacity;
    }

    fn flow_enabled(&self) -> bool {
        self.flow_state
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    /// Higher priorities are drained first and filled last.
    pub flow_priority: i32,
    pub resources: Vec<PartResource>,
}

impl Part {
    pub fn new(name: impl Into<String>, flow_priority: i32) -> Self {
        Self {
            name: name.into(),
            flow_priority,
            resources: Vec::new(),
        }
    }

    /// Builder: add a container for `resource`.
    pub fn with_resource(mut self, resource: &str, amount: f64, max_amount: f64) -> Self {
        self.resources
            .push(PartResource::new(resource, amount, max_amount));
        self
    }

    pub fn resource(&self, name: &str) -> Option<&PartResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn resource_mut(&mut self, name: &str) -> Option<&mut PartResource> {
        self.resources.iter_mut().find(|r| r.name == name)
    }
}

// ---------------------------------------------------------------------------
// Live craft
// ---------------------------------------------------------------------------

/// A loaded craft.
///
/// Reservoirs are enumerated in slot order, part by part, then in container
/// order within a part. Adding or removing a part between two syncs is fine:
/// the engine re-reads storage on every sync.
#[derive(Debug, Clone, Default)]
pub struct LiveCraft {
    pub name: String,
    parts: SlotMap<PartId, Part>,
}

impl LiveCraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: SlotMap::with_key(),
        }
    }

    pub fn add_part(&mut self, part: Part) -> PartId {
        self.parts.insert(part)
    }

    /// Detach a part (decoupling, destruction). Returns it if it existed.
    pub fn remove_part(&mut self, id: PartId) -> Option<Part> {
        self.parts.remove(id)
    }

    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    pub fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id)
    }

    pub fn parts(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Amount and capacity of `resource` over containers that take part in
    /// flow.
    pub fn total(&self, resource: &str) -> (f64, f64) {
        self.parts
            .values()
            .flat_map(|p| p.resources.iter())
            .filter(|r| r.name == resource && r.flow_state)
            .fold((0.0, 0.0), |(amount, capacity), r| {
                (amount + r.amount, capacity + r.max_amount)
            })
    }

    /// Enable or disable flow for `resource` on part `id`. Returns `false`
    /// if the part or container does not exist.
    pub fn set_flow(&mut self, id: PartId, resource: &str, enabled: bool) -> bool {
        match self.parts.get_mut(id).and_then(|p| p.resource_mut(resource)) {
            Some(r) => {
                r.flow_state = enabled;
                true
            }
            None => false,
        }
    }

    /// Serialize the craft into its background representation.
    pub fn to_snapshot(&self) -> CraftSnapshot {
        CraftSnapshot {
            name: self.name.clone(),
            parts: self
                .parts
                .values()
                .map(|part| PartSnapshot {
                    name: part.name.clone(),
                    flow_priority: part.flow_priority,
                    resources: part
                        .resources
                        .iter()
                        .map(|r| ResourceSnapshot {
                            name: r.name.clone(),
                            amount: r.amount,
                            max_amount: r.max_amount,
                            flow_state: r.flow_state,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Load a craft from its background representation. Parts receive fresh
    /// ids in snapshot order.
    pub fn from_snapshot(snapshot: &CraftSnapshot) -> Self {
        let mut craft = Self::new(snapshot.name.clone());
        for part in &snapshot.parts {
            craft.add_part(Part {
                name: part.name.clone(),
                flow_priority: part.flow_priority,
                resources: part
                    .resources
                    .iter()
                    .map(|r| PartResource {
                        name: r.name.clone(),
                        amount: r.amount,
                        max_amount: r.max_amount,
                        flow_state: r.flow_state,
                    })
                    .collect(),
            });
        }
        craft
    }
}

impl CraftStorage for LiveCraft {
    fn visit_reservoirs(
        &mut self,
        resource: &str,
        visitor: &mut dyn FnMut(i32, &mut dyn Reservoir),
    ) {
        for part in self.parts.values_mut() {
            let priority = part.flow_priority;
            for container in part.resources.iter_mut().filter(|r| r.name == resource) {
                visitor(priority, container);
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vesselflow_core::broker::BrokerId;
    use vesselflow_core::config::EngineConfig;
    use vesselflow_core::craft::CraftResources;
    use vesselflow_core::test_utils::assert_close;

    const LOAD: BrokerId = BrokerId(1);

    fn probe() -> (LiveCraft, PartId, PartId) {
        let mut craft = LiveCraft::new("probe");
        let core = craft.add_part(Part::new("core", 0).with_resource("ElectricCharge", 50.0, 100.0));
        let battery =
            craft.add_part(Part::new("battery", 5).with_resource("ElectricCharge", 40.0, 40.0));
        (craft, core, battery)
    }

    // -----------------------------------------------------------------------
    // Parts
    // -----------------------------------------------------------------------

    #[test]
    fn add_and_remove_parts() {
        let (mut craft, core, battery) = probe();
        assert_eq!(craft.len(), 2);

        let removed = craft.remove_part(battery).unwrap();
        assert_eq!(removed.name, "battery");
        assert!(craft.part(battery).is_none());
        assert!(craft.remove_part(battery).is_none());
        assert_eq!(craft.part(core).unwrap().name, "core");
    }

    #[test]
    fn stale_id_does_not_alias_new_part() {
        let (mut craft, _, battery) = probe();
        craft.remove_part(battery);
        let tank = craft.add_part(Part::new("tank", 0));
        assert!(craft.part(battery).is_none());
        assert_eq!(craft.part(tank).unwrap().name, "tank");
    }

    #[test]
    fn total_skips_disabled_containers() {
        let (mut craft, _, battery) = probe();
        assert_eq!(craft.total("ElectricCharge"), (90.0, 140.0));

        assert!(craft.set_flow(battery, "ElectricCharge", false));
        assert_eq!(craft.total("ElectricCharge"), (50.0, 100.0));
        assert!(!craft.set_flow(battery, "Oxygen", false));
    }

    // -----------------------------------------------------------------------
    // Storage
    // -----------------------------------------------------------------------

    #[test]
    fn engine_mutates_parts_in_place() {
        let (mut craft, core, battery) = probe();
        let mut resources = CraftResources::new();

        resources.consume("ElectricCharge", 60.0, LOAD);
        resources.sync(&mut craft, 1.0, 1.0, &EngineConfig::default());

        // The priority 5 battery is tapped first.
        let battery_ec = craft.part(battery).unwrap().resource("ElectricCharge").unwrap();
        let core_ec = craft.part(core).unwrap().resource("ElectricCharge").unwrap();
        assert_close(battery_ec.amount, 0.0);
        assert_close(core_ec.amount, 30.0);
        assert_close(resources.resource("ElectricCharge").unwrap().amount(), 30.0);
    }

    #[test]
    fn disabled_container_is_untouched() {
        let (mut craft, core, battery) = probe();
        craft.set_flow(battery, "ElectricCharge", false);
        let mut resources = CraftResources::new();

        resources.consume("ElectricCharge", 20.0, LOAD);
        resources.sync(&mut craft, 1.0, 1.0, &EngineConfig::default());

        let part = craft.part(battery).unwrap();
        assert_eq!(part.resource("ElectricCharge").unwrap().amount, 40.0);
        let core_ec = craft.part(core).unwrap().resource("ElectricCharge").unwrap();
        assert_close(core_ec.amount, 30.0);
    }

    #[test]
    fn removed_part_changes_capacity() {
        let (mut craft, _, battery) = probe();
        let mut resources = CraftResources::new();
        let config = EngineConfig::default();
        resources.get_resource("ElectricCharge");
        resources.sync(&mut craft, 1.0, 1.0, &config);
        assert_eq!(resources.resource("ElectricCharge").unwrap().capacity(), 140.0);

        craft.remove_part(battery);
        resources.sync(&mut craft, 1.0, 1.0, &config);
        let ec = resources.resource("ElectricCharge").unwrap();
        assert_eq!(ec.capacity(), 100.0);
        assert_eq!(ec.amount(), 50.0);
    }

    // -----------------------------------------------------------------------
    // Snapshot conversion
    // -----------------------------------------------------------------------

    #[test]
    fn snapshot_round_trip_keeps_order() {
        let (mut craft, _, battery) = probe();
        craft.set_flow(battery, "ElectricCharge", false);

        let snapshot = craft.to_snapshot();
        assert_eq!(snapshot.name, "probe");
        assert_eq!(snapshot.parts.len(), 2);
        assert_eq!(snapshot.parts[1].flow_priority, 5);
        assert!(!snapshot.parts[1].resources[0].flow_state);

        let reloaded = LiveCraft::from_snapshot(&snapshot);
        let names: Vec<&str> = reloaded.parts().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, vec!["core", "battery"]);
        assert_eq!(reloaded.to_snapshot(), snapshot);
    }
}
