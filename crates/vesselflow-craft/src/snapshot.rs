//! Background craft: the serialized form the host persists for unloaded
//! craft. The engine mutates it in place, so syncing an unloaded craft is
//! a read-modify-write of this structure and nothing else.

use serde::{Deserialize, Serialize};
use vesselflow_core::reservoir::{CraftStorage, Reservoir};

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub name: String,
    pub amount: f64,
    pub max_amount: f64,
    #[serde(default = "enabled")]
    pub flow_state: bool,
}

impl Reservoir for ResourceSnapshot {
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
pub struct PartSnapshot {
    pub name: String,
    #[serde(default)]
    pub flow_priority: i32,
    #[serde(default)]
    pub resources: Vec<ResourceSnapshot>,
}

impl PartSnapshot {
    pub fn new(name: impl Into<String>, flow_priority: i32) -> Self {
        Self {
            name: name.into(),
            flow_priority,
            resources: Vec::new(),
        }
    }

    /// Builder: add a container for `resource`.
    pub fn with_resource(mut self, resource: &str, amount: f64, max_amount: f64) -> Self {
        self.resources.push(ResourceSnapshot {
            name: resource.to_string(),
            amount,
            max_amount,
            flow_state: true,
        });
        self
    }
}

/// Serialized craft. Reservoirs are enumerated part by part in list order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CraftSnapshot {
    pub name: String,
    #[serde(default)]
    pub parts: Vec<PartSnapshot>,
}

impl CraftSnapshot {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parts: Vec::new(),
        }
    }

    /// Builder: append a part.
    pub fn with_part(mut self, part: PartSnapshot) -> Self {
        self.parts.push(part);
        self
    }

    /// Total amount of `resource` over containers that take part in flow.
    pub fn amount_of(&self, resource: &str) -> f64 {
        self.containers(resource)
            .filter(|r| r.flow_state)
            .map(|r| r.amount)
            .sum()
    }

    /// Every container holding `resource`, enabled or not.
    pub fn containers<'a>(
        &'a self,
        resource: &'a str,
    ) -> impl Iterator<Item = &'a ResourceSnapshot> + 'a {
        self.parts
            .iter()
            .flat_map(|p| p.resources.iter())
            .filter(move |r| r.name == resource)
    }
}

impl CraftStorage for CraftSnapshot {
    fn visit_reservoirs(
        &mut self,
        resource: &str,
        visitor: &mut dyn FnMut(i32, &mut dyn Reservoir),
    ) {
        for part in &mut self.parts {
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
