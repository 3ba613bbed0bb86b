//! Broker registry: named sources and sinks of resource flow.
//!
//! Brokers exist for attribution only. A ledger accumulates how much each
//! broker produced or consumed during a step and publishes per-broker rates
//! after synchronization. Brokers are deduplicated by key and never removed;
//! the set is small and fixed by the host's content catalog.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifies a broker in a [`BrokerRegistry`]. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BrokerId(pub u32);

impl BrokerId {
    /// The reserved broker that non-engine storage changes are attributed to.
    pub const UNSUPPORTED: BrokerId = BrokerId(0);
}

/// Coarse grouping of brokers, used by hosts to organize breakdowns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrokerCategory {
    Generator,
    Converter,
    SolarPanel,
    Harvester,
    Rtg,
    FuelCell,
    Eclss,
    VesselSystem,
    Crew,
    Comms,
    Science,
    #[default]
    Unknown,
}

impl BrokerCategory {
    /// Parse a category name, case-insensitively. Unrecognized names map to
    /// [`BrokerCategory::Unknown`].
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "generator" => Self::Generator,
            "converter" => Self::Converter,
            "solar_panel" | "solarpanel" => Self::SolarPanel,
            "harvester" => Self::Harvester,
            "rtg" => Self::Rtg,
            "fuel_cell" | "fuelcell" => Self::FuelCell,
            "eclss" => Self::Eclss,
            "vessel_system" | "vesselsystem" => Self::VesselSystem,
            "crew" => Self::Crew,
            "comms" => Self::Comms,
            "science" => Self::Science,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generator => "generator",
            Self::Converter => "converter",
            Self::SolarPanel => "solar_panel",
            Self::Harvester => "harvester",
            Self::Rtg => "rtg",
            Self::FuelCell => "fuel_cell",
            Self::Eclss => "eclss",
            Self::VesselSystem => "vessel_system",
            Self::Crew => "crew",
            Self::Comms => "comms",
            Self::Science => "science",
            Self::Unknown => "unknown",
        }
    }
}

/// A registered broker. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broker {
    pub key: String,
    pub category: BrokerCategory,
    pub title: String,
}

/// Deduplicated set of brokers, looked up by string key.
///
/// The first registration of a key wins: later calls with a different
/// category or title return the existing broker unchanged.
#[derive(Debug, Clone)]
pub struct BrokerRegistry {
    brokers: Vec<Broker>,
    by_key: HashMap<String, BrokerId>,
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BrokerRegistry {
    /// Key of the reserved broker at [`BrokerId::UNSUPPORTED`].
    pub const UNSUPPORTED_KEY: &'static str = "unsupported";

    /// Create a registry holding only the reserved unsupported broker.
    pub fn new() -> Self {
        let mut registry = Self {
            brokers: Vec::new(),
            by_key: HashMap::new(),
        };
        let id = registry.get_or_create_with(
            Self::UNSUPPORTED_KEY,
            BrokerCategory::Unknown,
            "Non-engine activity",
        );
        debug_assert_eq!(id, BrokerId::UNSUPPORTED);
        registry
    }

    /// Return the broker for `key`, creating it with an unknown category and
    /// the key as title if it does not exist yet.
    pub fn get_or_create(&mut self, key: &str) -> BrokerId {
        self.get_or_create_with(key, BrokerCategory::Unknown, key)
    }

    /// Return the broker for `key`, creating it with `category` and `title`
    /// on first registration.
    pub fn get_or_create_with(
        &mut self,
        key: &str,
        category: BrokerCategory,
        title: &str,
    ) -> BrokerId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = BrokerId(self.brokers.len() as u32);
        self.brokers.push(Broker {
            key: key.to_string(),
            category,
            title: title.to_string(),
        });
        self.by_key.insert(key.to_string(), id);
        id
    }

    pub fn get(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.get(id.0 as usize)
    }

    /// Lookup a broker id by key without creating it.
    pub fn id(&self, key: &str) -> Option<BrokerId> {
        self.by_key.get(key).copied()
    }

    /// Display title for a broker, or `"unknown"` for foreign ids.
    pub fn title(&self, id: BrokerId) -> &str {
        self.get(id).map(|b| b.title.as_str()).unwrap_or("unknown")
    }

    pub fn len(&self) -> usize {
        self.brokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brokers.is_empty()
    }

    /// Iterate all brokers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (BrokerId, &Broker)> {
        self.brokers
            .iter()
            .enumerate()
            .map(|(i, b)| (BrokerId(i as u32), b))
    }
}
