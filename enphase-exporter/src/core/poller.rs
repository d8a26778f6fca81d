use std::{sync::Arc, time::Duration};

use chrono::Utc;
use clap::ValueEnum;
use tokio::{
    sync::{Mutex, MutexGuard, watch},
    time::{MissedTickBehavior, interval, timeout},
};

use crate::{
    api::envoy::Device,
    core::{
        local_time::{LocalTimeReading, TimeZoneTable},
        snapshot::{Snapshot, Telemetry},
    },
    prelude::*,
};

/// What drives a cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, derive_more::Display)]
pub enum TriggerMode {
    /// Background timer, scrapes read the latest published telemetry.
    #[display("timer")]
    Timer,

    /// Every scrape performs a fresh fetch, so scrape latency includes the device latency.
    #[display("scrape")]
    Scrape,
}

/// Owns the device and the only writer of the published [`Telemetry`].
pub struct Poller {
    device: Box<dyn Device>,
    time_zones: TimeZoneTable,
    sender: watch::Sender<Arc<Telemetry>>,

    /// Serializes cycles, so that concurrent triggers cannot interleave.
    cycle_lock: Mutex<()>,
}

impl Poller {
    pub fn new(device: impl Device + 'static, time_zones: TimeZoneTable) -> Self {
        let initial = Telemetry {
            local_times: LocalTimeReading::compute(&time_zones, Utc::now()),
            ..Telemetry::default()
        };
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { device: Box::new(device), time_zones, sender, cycle_lock: Mutex::new(()) }
    }

    /// Latest published telemetry. Does not wait for an in-flight cycle.
    #[must_use]
    pub fn current(&self) -> Arc<Telemetry> {
        self.sender.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Telemetry>> {
        self.sender.subscribe()
    }

    /// Run one cycle and publish its outcome.
    ///
    /// A failed fetch degrades the published snapshot and is otherwise swallowed.
    pub async fn refresh(&self) -> Arc<Telemetry> {
        let guard = self.cycle_lock.lock().await;
        self.cycle(guard).await
    }

    /// Same as [`Self::refresh`], but waits at most `wait` for an in-flight cycle to finish.
    ///
    /// When the wait expires, no fetch is made and the latest published telemetry is returned.
    pub async fn refresh_within(&self, wait: Duration) -> Arc<Telemetry> {
        if let Ok(guard) = timeout(wait, self.cycle_lock.lock()).await {
            self.cycle(guard).await
        } else {
            warn!(?wait, "another cycle is still in flight, serving the latest telemetry");
            self.current()
        }
    }

    #[instrument(skip_all)]
    async fn cycle(&self, _guard: MutexGuard<'_, ()>) -> Arc<Telemetry> {
        let previous = self.current();

        let snapshot = match self.device.fetch().await {
            Ok(reading) => {
                info!(
                    power_now = %reading.power_now,
                    energy_today = %reading.energy_today,
                    energy_lifetime = %reading.energy_lifetime,
                    "fetched the production",
                );
                Snapshot::healthy(reading, Utc::now())
            }
            Err(error) => {
                warn!("failed to fetch the production: {:#}", Error::from(error));
                Snapshot::degraded(&previous.snapshot)
            }
        };
        let telemetry = Arc::new(Telemetry {
            cycle: previous.cycle + 1,
            snapshot,
            local_times: LocalTimeReading::compute(&self.time_zones, Utc::now()),
        });

        if previous.state() != telemetry.state() {
            info!(from = %previous.state(), to = %telemetry.state(), "state changed");
        }
        self.sender.send_replace(Arc::clone(&telemetry));
        telemetry
    }

    /// Timer mode: the first cycle runs immediately, then every `period`.
    ///
    /// Never returns, abort the task to stop it.
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }
}
