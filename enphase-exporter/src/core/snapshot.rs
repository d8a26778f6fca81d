use chrono::{DateTime, Utc};
use enphase_quantities::{WattHours, Watts};

use crate::{api::envoy::Reading, core::local_time::LocalTimeReading};

/// Outcome of the most recent cycle.
///
/// Never mutated: every cycle builds a new one.
#[must_use]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub last_reading: Option<Reading>,

    /// Whether the most recent fetch succeeded.
    pub healthy: bool,

    pub last_success_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub const fn healthy(reading: Reading, at: DateTime<Utc>) -> Self {
        Self { last_reading: Some(reading), healthy: true, last_success_at: Some(at) }
    }

    /// Drop the reading, but remember when the device was last seen.
    pub const fn degraded(previous: &Self) -> Self {
        Self { last_reading: None, healthy: false, last_success_at: previous.last_success_at }
    }

    fn exported_reading(&self) -> Option<&Reading> {
        self.last_reading.as_ref().filter(|_| self.healthy)
    }

    pub fn power_now(&self) -> Watts {
        self.exported_reading().map_or(Watts::ZERO, |reading| reading.power_now)
    }

    pub fn energy_today(&self) -> WattHours {
        self.exported_reading().map_or(WattHours::ZERO, |reading| reading.energy_today)
    }

    pub fn energy_lifetime(&self) -> WattHours {
        self.exported_reading().map_or(WattHours::ZERO, |reading| reading.energy_lifetime)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display)]
pub enum PollerState {
    #[display("uninitialized")]
    Uninitialized,

    #[display("healthy")]
    Healthy,

    #[display("degraded")]
    Degraded,
}

/// Everything a single cycle publishes, as one unit.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Telemetry {
    /// Number of completed cycles, zero until the first one.
    pub cycle: u64,

    pub snapshot: Snapshot,
    pub local_times: LocalTimeReading,
}

impl Telemetry {
    pub const fn state(&self) -> PollerState {
        match (self.cycle, self.snapshot.healthy) {
            (0, _) => PollerState::Uninitialized,
            (_, true) => PollerState::Healthy,
            (_, false) => PollerState::Degraded,
        }
    }
}
