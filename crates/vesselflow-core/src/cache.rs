//! Craft identity to resource state.
//!
//! The cache is an explicit object owned by the host's simulation context.
//! Entries are created on first use and dropped when the host destroys a
//! craft ([`purge`](ResourceCache::purge)) or reloads its game state
//! ([`clear`](ResourceCache::clear)).

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::craft::CraftResources;
use crate::event::ResourceEvent;
use crate::reservoir::CraftStorage;
use crate::warp::{WarpControl, apply_ceilings};

/// Host-assigned craft identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CraftId(pub u64);

#[derive(Debug, Default)]
pub struct ResourceCache {
    config: EngineConfig,
    crafts: HashMap<CraftId, CraftResources>,
}

impl ResourceCache {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            crafts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resource state for `craft`, created on first use.
    pub fn get(&mut self, craft: CraftId) -> &mut CraftResources {
        self.crafts.entry(craft).or_default()
    }

    pub fn get_existing(&self, craft: CraftId) -> Option<&CraftResources> {
        self.crafts.get(&craft)
    }

    pub fn get_existing_mut(&mut self, craft: CraftId) -> Option<&mut CraftResources> {
        self.crafts.get_mut(&craft)
    }

    pub fn contains(&self, craft: CraftId) -> bool {
        self.crafts.contains_key(&craft)
    }

    pub fn len(&self) -> usize {
        self.crafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crafts.is_empty()
    }

    /// Drop the state of a destroyed or invalidated craft.
    pub fn purge(&mut self, craft: CraftId) -> Option<CraftResources> {
        let removed = self.crafts.remove(&craft);
        if removed.is_some() {
            debug!("purged resource state of craft {}", craft.0);
        }
        removed
    }

    /// Drop every entry, e.g. on game-state reload.
    pub fn clear(&mut self) {
        debug!("clearing resource state of {} crafts", self.crafts.len());
        self.crafts.clear();
    }

    /// Close the step of one craft and apply any warp ceiling it reports.
    pub fn sync(
        &mut self,
        craft: CraftId,
        storage: &mut dyn CraftStorage,
        elapsed_s: f64,
        warp: &mut dyn WarpControl,
    ) -> Vec<ResourceEvent> {
        let Self { config, crafts } = self;
        crafts
            .entry(craft)
            .or_default()
            .sync_with_warp(storage, elapsed_s, warp, config)
    }

    /// Close the step of many crafts concurrently.
    ///
    /// Every craft reads the same acceleration factor; ceilings are applied
    /// to `warp` once all crafts are done. If an id appears more than once
    /// only its first storage is synced.
    #[cfg(feature = "parallel")]
    pub fn sync_parallel<S: CraftStorage + Send>(
        &mut self,
        crafts: &mut [(CraftId, S)],
        elapsed_s: f64,
        warp: &mut dyn WarpControl,
    ) -> Vec<(CraftId, ResourceEvent)> {
        use rayon::prelude::*;

        let warp_rate = warp.current_rate();
        let Self {
            config,
            crafts: sets,
        } = self;
        for (id, _) in crafts.iter() {
            sets.entry(*id).or_default();
        }

        let mut by_id: HashMap<CraftId, &mut CraftResources> =
            sets.iter_mut().map(|(id, set)| (*id, set)).collect();
        let jobs: Vec<(CraftId, &mut CraftResources, &mut S)> = crafts
            .iter_mut()
            .filter_map(|(id, storage)| by_id.remove(&*id).map(|set| (*id, set, storage)))
            .collect();

        let config = &*config;
        let results: Vec<(CraftId, Vec<ResourceEvent>)> = jobs
            .into_par_iter()
            .map(|(id, set, storage)| (id, set.sync(storage, elapsed_s, warp_rate, config)))
            .collect();

        let events: Vec<(CraftId, ResourceEvent)> = results
            .into_iter()
            .flat_map(|(id, events)| events.into_iter().map(move |e| (id, e)))
            .collect();
        apply_ceilings(events.iter().map(|(_, e)| e), warp);
        events
    }
}

// ===========================================================================
// Tests
// ===========================================================================
