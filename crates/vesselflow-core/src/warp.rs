//! Time-acceleration control.
//!
//! The engine never owns the host's clock. Ledgers read the current
//! acceleration as a plain value and report a ceiling through
//! [`ResourceEvent::IncoherentProducer`](crate::event::ResourceEvent); the
//! craft set or cache then applies it through [`WarpControl`].

use crate::event::ResourceEvent;

/// Host-side handle on the simulation's time acceleration factor.
pub trait WarpControl {
    fn current_rate(&self) -> f64;

    /// Force the acceleration factor down to at most `ceiling`.
    fn limit_rate(&mut self, ceiling: f64);
}

/// A plain acceleration factor, for hosts without a richer clock and for
/// tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedWarp {
    pub rate: f64,
}

impl FixedWarp {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }
}

impl Default for FixedWarp {
    fn default() -> Self {
        Self { rate: 1.0 }
    }
}

impl WarpControl for FixedWarp {
    fn current_rate(&self) -> f64 {
        self.rate
    }

    fn limit_rate(&mut self, ceiling: f64) {
        if self.rate > ceiling {
            self.rate = ceiling;
        }
    }
}

/// Apply every warp ceiling carried by `events` to `warp`. Returns the
/// lowest ceiling applied, if any.
pub fn apply_ceilings<'a>(
    events: impl IntoIterator<Item = &'a ResourceEvent>,
    warp: &mut dyn WarpControl,
) -> Option<f64> {
    let lowest = events
        .into_iter()
        .filter_map(ResourceEvent::warp_ceiling)
        .reduce(f64::min)?;
    warp.limit_rate(lowest);
    Some(lowest)
}
