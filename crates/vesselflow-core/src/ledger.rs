//! Per-resource deferred ledger.
//!
//! Producers and consumers only move the ledger's `deferred` balance. Once
//! per step, [`ResourceLedger::sync`] reconciles that balance with the
//! craft's reservoirs:
//!
//! 1. Re-read storage, attributing any change since the last sync to
//!    non-engine actors.
//! 2. Clamp the deferred delta to what storage can give or take.
//! 3. Distribute it by flow priority and write dirty reservoirs back.
//! 4. Recompute level, rates and per-broker attribution, and report
//!    transitions as [`ResourceEvent`]s.

use std::collections::HashMap;

use log::{debug, trace, warn};

use crate::AMOUNT_EPSILON;
use crate::broker::BrokerId;
use crate::config::EngineConfig;
use crate::event::ResourceEvent;
use crate::reservoir::CraftStorage;
use crate::tank::PriorityTanks;

/// Published rate of one broker for the last synchronized step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrokerRate {
    pub broker: BrokerId,
    /// Units per second. Negative for consumers.
    pub rate: f64,
    /// `true` for interval-rule average rates, `false` for continuous flow.
    pub interval: bool,
}

/// Deferred bookkeeping for one resource on one craft.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    name: String,
    tanks: PriorityTanks,

    deferred: f64,
    amount: f64,
    capacity: f64,
    level: f64,
    rate: f64,
    average_rate: f64,
    unsupported_rate: f64,
    intervaled_amount: f64,

    /// Net amount per broker this step.
    broker_amounts: HashMap<BrokerId, f64>,
    /// Average rate per broker reported by interval rules this step.
    interval_rates: HashMap<BrokerId, f64>,
    broker_rates: Vec<BrokerRate>,

    /// False until the first sync; the first sync has no baseline to
    /// compare storage against.
    synced: bool,
}

impl ResourceLedger {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tanks: PriorityTanks::new(),
            deferred: 0.0,
            amount: 0.0,
            capacity: 0.0,
            level: 0.0,
            rate: 0.0,
            average_rate: 0.0,
            unsupported_rate: 0.0,
            intervaled_amount: 0.0,
            broker_amounts: HashMap::new(),
            interval_rates: HashMap::new(),
            broker_rates: Vec::new(),
            synced: false,
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Defer production of `quantity` units, attributed to `broker`.
    ///
    /// Non-finite and non-positive quantities are ignored.
    pub fn produce(&mut self, quantity: f64, broker: BrokerId) {
        debug_assert!(!(quantity < 0.0), "negative production {quantity}");
        if !is_request(quantity) {
            return;
        }
        self.deferred += quantity;
        if quantity.abs() >= AMOUNT_EPSILON {
            *self.broker_amounts.entry(broker).or_insert(0.0) += quantity;
        }
    }

    /// Defer consumption of `quantity` units, attributed to `broker`.
    ///
    /// Non-finite and non-positive quantities are ignored.
    pub fn consume(&mut self, quantity: f64, broker: BrokerId) {
        debug_assert!(!(quantity < 0.0), "negative consumption {quantity}");
        if !is_request(quantity) {
            return;
        }
        self.deferred -= quantity;
        if quantity.abs() >= AMOUNT_EPSILON {
            *self.broker_amounts.entry(broker).or_insert(0.0) -= quantity;
        }
    }

    /// Record a one-off change made by a periodic rule.
    ///
    /// `amount` is signed and is excluded from the continuous rate;
    /// `average_rate` is the rule's long-run rate and feeds
    /// [`average_rate`](Self::average_rate). This only does bookkeeping: the
    /// rule still moves the resource through `produce` / `consume`.
    pub fn update_interval_rule(&mut self, amount: f64, average_rate: f64, broker: BrokerId) {
        self.intervaled_amount += amount;
        *self.interval_rates.entry(broker).or_insert(0.0) += average_rate;
    }

    // -----------------------------------------------------------------------
    // Synchronization
    // -----------------------------------------------------------------------

    /// Re-read amount and capacity from storage without applying anything.
    ///
    /// Used when a ledger is created mid-step so availability checks see
    /// real contents before the first sync.
    pub fn refresh(&mut self, storage: &mut dyn CraftStorage) {
        self.tanks.gather(storage, &self.name);
        self.amount = self.tanks.amount();
        self.capacity = self.tanks.capacity();
        self.level = level_of(self.amount, self.capacity);
    }

    /// Apply this step's deferred delta to storage and recompute every
    /// derived value.
    ///
    /// `warp_rate` is the host's current time acceleration factor. Returns
    /// the transitions detected during this sync.
    pub fn sync(
        &mut self,
        storage: &mut dyn CraftStorage,
        elapsed_s: f64,
        warp_rate: f64,
        config: &EngineConfig,
    ) -> Vec<ResourceEvent> {
        debug_assert!(elapsed_s > 0.0, "non-positive elapsed time {elapsed_s}");
        let mut events = Vec::new();
        let first_sync = !self.synced;

        let old_capacity = self.capacity;
        let old_level = self.level;

        self.tanks.gather(storage, &self.name);
        let gathered = self.tanks.amount();
        self.capacity = self.tanks.capacity();
        // Without a previous sync, whatever is in storage is the baseline.
        let old_amount = if first_sync { gathered } else { self.amount };

        self.unsupported_rate = per_second(gathered - old_amount, elapsed_s);
        if self.unsupported_rate.abs() < AMOUNT_EPSILON {
            self.unsupported_rate = 0.0;
        }

        let flow_state_changed =
            !first_sync && (self.capacity - old_capacity).abs() > AMOUNT_EPSILON;
        if flow_state_changed {
            debug!(
                "{}: capacity changed {:.3} -> {:.3}",
                self.name, old_capacity, self.capacity
            );
            events.push(ResourceEvent::CapacityChanged {
                resource: self.name.clone(),
                old: old_capacity,
                new: self.capacity,
            });
        }

        let clamped = self
            .deferred
            .max(-gathered)
            .min((self.capacity - gathered).max(0.0));
        if clamped.abs() > AMOUNT_EPSILON {
            self.tanks.apply_delta(clamped);
            self.tanks.write_back(storage, &self.name);
        }

        self.amount = self.tanks.amount();
        self.deferred = 0.0;
        self.level = level_of(self.amount, self.capacity);

        self.rate = per_second(self.amount - old_amount - self.intervaled_amount, elapsed_s);
        self.average_rate = self.rate + self.interval_rates.values().sum::<f64>();

        self.publish_broker_rates(elapsed_s);

        if !flow_state_changed
            && self.unsupported_rate > 0.0
            && warp_rate > config.coherency_warp_threshold
        {
            warn!(
                "{}: non-engine production of {:.6}/s at warp {:.0}, limiting warp to {:.0}",
                self.name, self.unsupported_rate, warp_rate, config.coherency_warp_ceiling
            );
            events.push(ResourceEvent::IncoherentProducer {
                resource: self.name.clone(),
                rate: self.unsupported_rate,
                warp_limited_to: config.coherency_warp_ceiling,
            });
        }

        if !first_sync {
            if self.level <= config.level_empty_threshold
                && old_level > config.level_empty_threshold
            {
                events.push(ResourceEvent::Depleted {
                    resource: self.name.clone(),
                });
            } else if self.level >= config.level_full_threshold
                && old_level < config.level_full_threshold
            {
                events.push(ResourceEvent::Filled {
                    resource: self.name.clone(),
                });
            }
        }

        trace!(
            "{}: amount {:.6}/{:.6} rate {:.6} avg {:.6} unsupported {:.6}",
            self.name, self.amount, self.capacity, self.rate, self.average_rate, self.unsupported_rate
        );

        self.synced = true;
        events
    }

    fn publish_broker_rates(&mut self, elapsed_s: f64) {
        self.broker_rates.clear();
        self.broker_rates
            .extend(self.broker_amounts.drain().map(|(broker, net)| BrokerRate {
                broker,
                rate: per_second(net, elapsed_s),
                interval: false,
            }));
        self.broker_rates
            .extend(self.interval_rates.drain().map(|(broker, rate)| BrokerRate {
                broker,
                rate,
                interval: true,
            }));
        if self.unsupported_rate != 0.0 {
            self.broker_rates.push(BrokerRate {
                broker: BrokerId::UNSUPPORTED,
                rate: self.unsupported_rate,
                interval: false,
            });
        }
        self.broker_rates.sort_by(|a, b| {
            a.rate
                .total_cmp(&b.rate)
                .then_with(|| a.broker.cmp(&b.broker))
                .then_with(|| a.interval.cmp(&b.interval))
        });
        self.intervaled_amount = 0.0;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Amount in storage as of the last sync or refresh.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// `amount / capacity`, or 0 without capacity.
    pub fn level(&self) -> f64 {
        self.level
    }

    /// Continuous rate of change over the last step, per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Continuous rate plus interval-rule average rates.
    pub fn average_rate(&self) -> f64 {
        self.average_rate
    }

    /// Pending signed delta for the current step.
    pub fn deferred(&self) -> f64 {
        self.deferred
    }

    /// Rate attributed to storage changes made outside the engine.
    pub fn unsupported_rate(&self) -> f64 {
        self.unsupported_rate
    }

    /// Sum of this step's interval-rule amounts.
    pub fn intervaled_amount(&self) -> f64 {
        self.intervaled_amount
    }

    /// Amount including the pending delta.
    pub fn available(&self) -> f64 {
        self.amount + self.deferred
    }

    /// Space left including the pending delta.
    pub fn free_capacity(&self) -> f64 {
        (self.capacity - self.available()).max(0.0)
    }

    /// Per-broker rates of the last sync, sorted ascending (largest
    /// consumers first).
    pub fn broker_rates(&self) -> &[BrokerRate] {
        &self.broker_rates
    }

    /// Seconds until the resource runs out at the current average rate.
    pub fn depletion_time(&self) -> f64 {
        if self.amount <= AMOUNT_EPSILON {
            0.0
        } else if self.average_rate >= -AMOUNT_EPSILON {
            f64::INFINITY
        } else {
            self.amount / -self.average_rate
        }
    }

    pub fn is_full(&self, config: &EngineConfig) -> bool {
        self.capacity > 0.0 && self.level >= config.level_full_threshold
    }

    pub fn is_empty(&self, config: &EngineConfig) -> bool {
        self.level <= config.level_empty_threshold
    }

    /// Whether [`sync`](Self::sync) has run at least once.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn tanks(&self) -> &PriorityTanks {
        &self.tanks
    }
}

fn is_request(quantity: f64) -> bool {
    quantity.is_finite() && quantity > 0.0
}

fn level_of(amount: f64, capacity: f64) -> f64 {
    if capacity > 0.0 { amount / capacity } else { 0.0 }
}

fn per_second(amount: f64, elapsed_s: f64) -> f64 {
    if elapsed_s > 0.0 { amount / elapsed_s } else { 0.0 }
}

// ===========================================================================
// Tests
// ===========================================================================
