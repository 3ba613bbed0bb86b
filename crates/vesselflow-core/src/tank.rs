//! Tank sets and the priority-ordered tank collection.
//!
//! Reservoirs that share a flow priority form one [`TankSet`] and are treated
//! as a single pooled container: a delta is spread across members in
//! proportion to their contents (pulling) or their free space (pushing).
//! [`PriorityTanks`] orders the sets of one resource on one craft and applies
//! a net delta across them:
//!
//! - Pulling drains the **highest** priority set first.
//! - Pushing fills the **lowest** priority set first.
//!
//! A high priority therefore marks a reservoir as a buffer: it is the first
//! one tapped and the last one topped up.
//!
//! All per-sync objects live in a [`TankPool`] that is reset, not
//! reallocated, between syncs.

use crate::reservoir::{CraftStorage, Reservoir, ReservoirWrapper};

/// Slack allowed on the `ApplyDelta` precondition before the debug check fires.
const PRECONDITION_SLACK: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Tank set
// ---------------------------------------------------------------------------

/// Reservoirs sharing one flow priority.
///
/// Members are indices into the pool's wrapper storage. `amount` and
/// `capacity` always equal the sums over members.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TankSet {
    priority: i32,
    members: Vec<usize>,
    amount: f64,
    capacity: f64,
}

impl TankSet {
    pub fn new(priority: i32) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }

    /// Clear members and re-key the set for reuse.
    pub fn reset(&mut self, priority: i32) {
        self.priority = priority;
        self.members.clear();
        self.amount = 0.0;
        self.capacity = 0.0;
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Free space across all members.
    pub fn headroom(&self) -> f64 {
        (self.capacity - self.amount).max(0.0)
    }

    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Add the wrapper at `index` to this set.
    pub fn add(&mut self, wrappers: &[ReservoirWrapper], index: usize) {
        if let Some(w) = wrappers.get(index) {
            self.members.push(index);
            self.amount += w.amount();
            self.capacity += w.capacity();
        }
    }

    /// Top every member up to capacity.
    pub fn fill(&mut self, wrappers: &mut [ReservoirWrapper]) {
        for &i in &self.members {
            if let Some(w) = wrappers.get_mut(i) {
                let cap = w.capacity();
                w.set_amount(cap);
            }
        }
        self.recompute(wrappers);
    }

    /// Drain every member to zero.
    pub fn empty(&mut self, wrappers: &mut [ReservoirWrapper]) {
        for &i in &self.members {
            if let Some(w) = wrappers.get_mut(i) {
                w.set_amount(0.0);
            }
        }
        self.recompute(wrappers);
    }

    /// Apply a signed delta across members.
    ///
    /// Requires `-amount <= delta <= capacity - amount`; callers clamp first.
    pub fn apply_delta(&mut self, wrappers: &mut [ReservoirWrapper], delta: f64) {
        debug_assert!(
            delta >= -self.amount - PRECONDITION_SLACK
                && delta <= self.headroom() + PRECONDITION_SLACK,
            "tank set delta {delta} outside [-{}, {}]",
            self.amount,
            self.headroom()
        );

        if delta < 0.0 {
            if self.amount <= 0.0 {
                return;
            }
            if -delta >= self.amount {
                self.empty(wrappers);
                return;
            }
            // Loss proportional to each member's own contents.
            let ratio = delta / self.amount;
            for &i in &self.members {
                if let Some(w) = wrappers.get_mut(i) {
                    let amount = w.amount();
                    let next = (amount + amount * ratio).max(0.0).min(w.capacity());
                    w.set_amount(next);
                }
            }
        } else if delta > 0.0 {
            let headroom = self.headroom();
            if headroom <= 0.0 {
                return;
            }
            if delta >= headroom {
                self.fill(wrappers);
                return;
            }
            // Gain proportional to each member's free space.
            let ratio = delta / headroom;
            for &i in &self.members {
                if let Some(w) = wrappers.get_mut(i) {
                    let next = (w.amount() + w.headroom() * ratio).min(w.capacity());
                    w.set_amount(next);
                }
            }
        } else {
            return;
        }
        self.recompute(wrappers);
    }

    fn recompute(&mut self, wrappers: &[ReservoirWrapper]) {
        self.amount = 0.0;
        self.capacity = 0.0;
        for &i in &self.members {
            if let Some(w) = wrappers.get(i) {
                self.amount += w.amount();
                self.capacity += w.capacity();
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Free-list of wrappers and tank sets reused across syncs.
///
/// [`acquire_wrapper`](Self::acquire_wrapper) and
/// [`acquire_set`](Self::acquire_set) hand out slots in order;
/// [`release_all`](Self::release_all) returns every slot at once without
/// freeing the backing storage.
#[derive(Debug, Clone, Default)]
pub struct TankPool {
    wrappers: Vec<ReservoirWrapper>,
    wrappers_live: usize,
    sets: Vec<TankSet>,
    sets_live: usize,
}

impl TankPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a reset wrapper slot and return its index.
    pub fn acquire_wrapper(&mut self) -> usize {
        let index = self.wrappers_live;
        if let Some(w) = self.wrappers.get_mut(index) {
            w.reset();
        } else {
            self.wrappers.push(ReservoirWrapper::default());
        }
        self.wrappers_live += 1;
        index
    }

    /// Hand out an empty tank set keyed by `priority` and return its index.
    pub fn acquire_set(&mut self, priority: i32) -> usize {
        let index = self.sets_live;
        if let Some(set) = self.sets.get_mut(index) {
            set.reset(priority);
        } else {
            self.sets.push(TankSet::new(priority));
        }
        self.sets_live += 1;
        index
    }

    /// Return every slot to the pool.
    pub fn release_all(&mut self) {
        self.wrappers_live = 0;
        self.sets_live = 0;
    }

    /// Wrappers currently handed out, in acquisition order.
    pub fn wrappers(&self) -> &[ReservoirWrapper] {
        &self.wrappers[..self.wrappers_live]
    }

    pub fn wrapper_mut(&mut self, index: usize) -> Option<&mut ReservoirWrapper> {
        self.wrappers[..self.wrappers_live].get_mut(index)
    }

    pub fn set(&self, index: usize) -> Option<&TankSet> {
        self.sets[..self.sets_live].get(index)
    }

    /// Total slots ever allocated (live or free).
    pub fn allocated(&self) -> (usize, usize) {
        (self.wrappers.len(), self.sets.len())
    }
}

// ---------------------------------------------------------------------------
// Priority tank collection
// ---------------------------------------------------------------------------

/// Tank sets of one resource on one craft, ordered by ascending priority.
///
/// Holds at most one set per distinct priority value.
#[derive(Debug, Clone, Default)]
pub struct PriorityTanks {
    pool: TankPool,
    /// Pool set indices sorted by ascending priority.
    order: Vec<usize>,
    amount: f64,
    capacity: f64,
}

impl PriorityTanks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all reservoirs, keeping pooled storage.
    pub fn clear(&mut self) {
        self.pool.release_all();
        self.order.clear();
        self.amount = 0.0;
        self.capacity = 0.0;
    }

    /// Register a reservoir at `priority`.
    pub fn add(&mut self, priority: i32, ordinal: usize, amount: f64, capacity: f64) {
        let slot = self.pool.acquire_wrapper();
        if let Some(w) = self.pool.wrapper_mut(slot) {
            w.bind(ordinal, amount, capacity);
        }

        let set_index = match self
            .order
            .binary_search_by_key(&priority, |&i| self.pool.sets[i].priority())
        {
            Ok(pos) => self.order[pos],
            Err(pos) => {
                let index = self.pool.acquire_set(priority);
                self.order.insert(pos, index);
                index
            }
        };

        let TankPool { wrappers, sets, .. } = &mut self.pool;
        if let Some(set) = sets.get_mut(set_index) {
            set.add(wrappers, slot);
        }
        self.amount += amount;
        self.capacity += capacity;
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn set_count(&self) -> usize {
        self.order.len()
    }

    /// Tank sets in ascending priority order.
    pub fn sets(&self) -> impl Iterator<Item = &TankSet> {
        self.order.iter().filter_map(|&i| self.pool.set(i))
    }

    /// Wrappers in storage enumeration order.
    pub fn wrappers(&self) -> &[ReservoirWrapper] {
        self.pool.wrappers()
    }

    /// Apply a net delta across sets by priority and return the amount
    /// actually applied.
    ///
    /// Pulling drains sets from highest to lowest priority; pushing fills
    /// from lowest to highest. Each set is exhausted before the next is
    /// touched.
    pub fn apply_delta(&mut self, delta: f64) -> f64 {
        let TankPool { wrappers, sets, .. } = &mut self.pool;
        let mut remaining = delta.abs();

        if delta < 0.0 {
            for &i in self.order.iter().rev() {
                if remaining <= 0.0 {
                    break;
                }
                let Some(set) = sets.get_mut(i) else { continue };
                let take = remaining.min(set.amount());
                if take > 0.0 {
                    set.apply_delta(wrappers, -take);
                    remaining -= take;
                }
            }
        } else if delta > 0.0 {
            for &i in &self.order {
                if remaining <= 0.0 {
                    break;
                }
                let Some(set) = sets.get_mut(i) else { continue };
                let give = remaining.min(set.headroom());
                if give > 0.0 {
                    set.apply_delta(wrappers, give);
                    remaining -= give;
                }
            }
        }

        self.amount = 0.0;
        self.capacity = 0.0;
        for &i in &self.order {
            if let Some(set) = sets.get(i) {
                self.amount += set.amount();
                self.capacity += set.capacity();
            }
        }

        delta - delta.signum() * remaining.max(0.0)
    }

    /// Rebuild the collection from the craft's current reservoirs.
    ///
    /// Reservoirs with flow disabled are skipped but still consume an
    /// ordinal, so write-back lines up with the enumeration.
    pub fn gather(&mut self, storage: &mut dyn CraftStorage, resource: &str) {
        self.clear();
        let mut ordinal = 0usize;
        storage.visit_reservoirs(resource, &mut |priority, reservoir| {
            if reservoir.flow_enabled() {
                self.add(priority, ordinal, reservoir.amount(), reservoir.capacity());
            }
            ordinal += 1;
        });
    }

    /// Write changed amounts back to the craft. Returns the number of
    /// reservoirs written.
    pub fn write_back(&self, storage: &mut dyn CraftStorage, resource: &str) -> usize {
        let wrappers = self.pool.wrappers();
        if !wrappers.iter().any(|w| w.is_dirty()) {
            return 0;
        }

        let mut ordinal = 0usize;
        let mut cursor = 0usize;
        let mut written = 0usize;
        storage.visit_reservoirs(resource, &mut |_, reservoir| {
            if let Some(w) = wrappers.get(cursor) {
                if w.ordinal() == ordinal {
                    if w.is_dirty() {
                        reservoir.set_amount(w.amount());
                        written += 1;
                    }
                    cursor += 1;
                }
            }
            ordinal += 1;
        });
        written
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{VecStorage, assert_close};

    fn wrappers(specs: &[(f64, f64)]) -> Vec<ReservoirWrapper> {
        specs
            .iter()
            .enumerate()
            .map(|(i, &(amount, capacity))| {
                let mut w = ReservoirWrapper::default();
                w.bind(i, amount, capacity);
                w
            })
            .collect()
    }

    fn set_of(ws: &[ReservoirWrapper]) -> TankSet {
        let mut set = TankSet::new(0);
        for i in 0..ws.len() {
            set.add(ws, i);
        }
        set
    }

    /// Three sets at priorities 1, 2, 3, each one reservoir of capacity 10.
    fn three_tiers(amount: f64) -> PriorityTanks {
        let mut tanks = PriorityTanks::new();
        tanks.add(2, 0, amount, 10.0);
        tanks.add(1, 1, amount, 10.0);
        tanks.add(3, 2, amount, 10.0);
        tanks
    }

    fn tier_amount(tanks: &PriorityTanks, priority: i32) -> f64 {
        tanks
            .sets()
            .find(|s| s.priority() == priority)
            .map(|s| s.amount())
            .unwrap()
    }

    // -----------------------------------------------------------------------
    // Tank set
    // -----------------------------------------------------------------------

    #[test]
    fn add_tracks_sums() {
        let ws = wrappers(&[(2.0, 10.0), (3.0, 5.0)]);
        let set = set_of(&ws);
        assert_eq!(set.amount(), 5.0);
        assert_eq!(set.capacity(), 15.0);
        assert_eq!(set.members(), &[0, 1]);
    }

    #[test]
    fn pull_is_proportional_to_contents() {
        let mut ws = wrappers(&[(30.0, 100.0), (10.0, 100.0)]);
        let mut set = set_of(&ws);

        set.apply_delta(&mut ws, -20.0);

        // 30/40 of the loss from the first, 10/40 from the second.
        assert_close(ws[0].amount(), 15.0);
        assert_close(ws[1].amount(), 5.0);
        assert_close(set.amount(), 20.0);
    }

    #[test]
    fn push_is_proportional_to_headroom() {
        let mut ws = wrappers(&[(0.0, 30.0), (0.0, 10.0)]);
        let mut set = set_of(&ws);

        set.apply_delta(&mut ws, 20.0);

        assert_close(ws[0].amount(), 15.0);
        assert_close(ws[1].amount(), 5.0);
        assert_close(set.amount(), 20.0);
    }

    #[test]
    fn push_skips_full_members() {
        let mut ws = wrappers(&[(10.0, 10.0), (0.0, 10.0)]);
        let mut set = set_of(&ws);

        set.apply_delta(&mut ws, 4.0);

        assert_close(ws[0].amount(), 10.0);
        assert_close(ws[1].amount(), 4.0);
        assert!(!ws[0].is_dirty());
    }

    #[test]
    fn full_pull_empties_exactly() {
        let mut ws = wrappers(&[(1.0 / 3.0, 1.0), (2.0 / 3.0, 1.0)]);
        let mut set = set_of(&ws);
        let all = set.amount();

        set.apply_delta(&mut ws, -all);

        assert_eq!(ws[0].amount(), 0.0);
        assert_eq!(ws[1].amount(), 0.0);
        assert_eq!(set.amount(), 0.0);
    }

    #[test]
    fn fill_and_empty() {
        let mut ws = wrappers(&[(1.0, 4.0), (2.0, 6.0)]);
        let mut set = set_of(&ws);

        set.fill(&mut ws);
        assert_eq!(set.amount(), 10.0);
        assert_eq!(ws[1].amount(), 6.0);

        set.empty(&mut ws);
        assert_eq!(set.amount(), 0.0);
        assert_eq!(ws[0].amount(), 0.0);
    }

    #[test]
    fn zero_delta_touches_nothing() {
        let mut ws = wrappers(&[(1.0, 4.0)]);
        let mut set = set_of(&ws);
        set.apply_delta(&mut ws, 0.0);
        assert!(!ws[0].is_dirty());
    }

    // -----------------------------------------------------------------------
    // Priority collection
    // -----------------------------------------------------------------------

    #[test]
    fn sets_are_sorted_and_unique_per_priority() {
        let mut tanks = PriorityTanks::new();
        tanks.add(5, 0, 1.0, 2.0);
        tanks.add(-1, 1, 1.0, 2.0);
        tanks.add(5, 2, 1.0, 2.0);
        tanks.add(0, 3, 1.0, 2.0);

        let priorities: Vec<i32> = tanks.sets().map(|s| s.priority()).collect();
        assert_eq!(priorities, vec![-1, 0, 5]);
        assert_eq!(tanks.set_count(), 3);
        let top = tanks.sets().last().unwrap();
        assert_eq!(top.members().len(), 2);
        assert_eq!(tanks.amount(), 4.0);
        assert_eq!(tanks.capacity(), 8.0);
    }

    #[test]
    fn pull_drains_highest_priority_first() {
        let mut tanks = three_tiers(10.0);

        let applied = tanks.apply_delta(-15.0);

        assert_close(applied, -15.0);
        assert_close(tier_amount(&tanks, 3), 0.0);
        assert_close(tier_amount(&tanks, 2), 5.0);
        assert_close(tier_amount(&tanks, 1), 10.0);
        assert_close(tanks.amount(), 15.0);
    }

    #[test]
    fn push_fills_lowest_priority_first() {
        let mut tanks = three_tiers(0.0);

        let applied = tanks.apply_delta(15.0);

        assert_close(applied, 15.0);
        assert_close(tier_amount(&tanks, 1), 10.0);
        assert_close(tier_amount(&tanks, 2), 5.0);
        assert_close(tier_amount(&tanks, 3), 0.0);
    }

    #[test]
    fn oversized_delta_reports_partial_application() {
        let mut tanks = three_tiers(5.0);
        let applied = tanks.apply_delta(100.0);
        assert_close(applied, 15.0);
        assert_close(tanks.amount(), 30.0);
    }

    #[test]
    fn clear_reuses_pool_storage() {
        let mut tanks = three_tiers(1.0);
        let before = tanks.pool.allocated();

        tanks.clear();
        tanks.add(1, 0, 1.0, 1.0);
        tanks.add(2, 1, 1.0, 1.0);

        assert_eq!(tanks.pool.allocated(), before);
        assert_eq!(tanks.wrappers().len(), 2);
        assert_eq!(tanks.set_count(), 2);
    }

    #[test]
    fn gather_skips_disabled_but_keeps_ordinals() {
        let mut storage = VecStorage::new()
            .with("Charge", 0, 5.0, 10.0)
            .with_disabled("Charge", 0, 7.0, 10.0)
            .with("Oxygen", 0, 1.0, 1.0)
            .with("Charge", 1, 2.0, 10.0);

        let mut tanks = PriorityTanks::new();
        tanks.gather(&mut storage, "Charge");

        assert_eq!(tanks.amount(), 7.0);
        assert_eq!(tanks.capacity(), 20.0);
        let ordinals: Vec<usize> = tanks.wrappers().iter().map(|w| w.ordinal()).collect();
        assert_eq!(ordinals, vec![0, 2]);
    }

    #[test]
    fn write_back_updates_only_changed_reservoirs() {
        let mut storage = VecStorage::new()
            .with("Charge", 0, 5.0, 10.0)
            .with_disabled("Charge", 0, 7.0, 10.0)
            .with("Charge", 1, 10.0, 10.0);

        let mut tanks = PriorityTanks::new();
        tanks.gather(&mut storage, "Charge");
        tanks.apply_delta(-12.0);
        let written = tanks.write_back(&mut storage, "Charge");

        // Priority 1 drained fully, priority 0 gives the remaining 2.
        assert_eq!(written, 2);
        assert_close(storage.reservoir(0).amount, 3.0);
        assert_close(storage.reservoir(1).amount, 7.0);
        assert_close(storage.reservoir(2).amount, 0.0);
    }

    #[test]
    fn write_back_without_changes_skips_visit() {
        let mut storage = VecStorage::new().with("Charge", 0, 5.0, 10.0);
        let mut tanks = PriorityTanks::new();
        tanks.gather(&mut storage, "Charge");
        assert_eq!(tanks.write_back(&mut storage, "Charge"), 0);
    }
}
