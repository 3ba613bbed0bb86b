//! Events emitted by ledger synchronization.
//!
//! Like the power and fluid brownout events they are modeled on, level
//! events fire only on *transitions*, never every step.

/// Something noteworthy that happened to one resource during a sync.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent {
    /// Total capacity differs from the previous sync (reservoirs added,
    /// removed, or flow toggled by the host).
    CapacityChanged {
        resource: String,
        old: f64,
        new: f64,
    },
    /// Level dropped to the empty threshold.
    Depleted { resource: String },
    /// Level rose to the full threshold.
    Filled { resource: String },
    /// Storage grew between syncs without going through the engine while
    /// time acceleration was above the coherency threshold. Hosts must cap
    /// acceleration at `warp_limited_to`.
    IncoherentProducer {
        resource: String,
        rate: f64,
        warp_limited_to: f64,
    },
}

impl ResourceEvent {
    /// Name of the resource this event concerns.
    pub fn resource(&self) -> &str {
        match self {
            ResourceEvent::CapacityChanged { resource, .. }
            | ResourceEvent::Depleted { resource }
            | ResourceEvent::Filled { resource }
            | ResourceEvent::IncoherentProducer { resource, .. } => resource,
        }
    }

    /// The acceleration ceiling this event demands, if any.
    pub fn warp_ceiling(&self) -> Option<f64> {
        match self {
            ResourceEvent::IncoherentProducer {
                warp_limited_to, ..
            } => Some(*warp_limited_to),
            _ => None,
        }
    }
}
