use std::sync::Mutex;

use bon::Builder;
use prometheus::{GaugeVec, IntGauge, Opts, Registry, TextEncoder};

use crate::{core::snapshot::Telemetry, prelude::*};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

#[must_use]
#[derive(Clone, Builder)]
pub struct MetricsOptions {
    /// Prefix for every metric name.
    #[builder(into)]
    pub namespace: Option<String>,

    #[builder(default = true)]
    pub export_lifetime: bool,
}

/// Gauges owned by the scrape path, built once at startup.
pub struct Metrics {
    registry: Registry,
    gauges: Mutex<Gauges>,
}

struct Gauges {
    up: IntGauge,
    power_production: IntGauge,
    energy_today: IntGauge,
    energy_lifetime: Option<IntGauge>,
    local_time: GaugeVec,
}

impl Metrics {
    pub fn new(options: &MetricsOptions) -> Result<Self> {
        let opts = |name: &str, help: &str| {
            let opts = Opts::new(name, help);
            match &options.namespace {
                Some(namespace) => opts.namespace(namespace.clone()),
                None => opts,
            }
        };

        let registry = Registry::new();
        let up = IntGauge::with_opts(opts("up", "Whether the Enphase Envoy is responding"))?;
        let power_production =
            IntGauge::with_opts(opts("power_production_watts", "Power being produced, in W"))?;
        let energy_today =
            IntGauge::with_opts(opts("energy_today_watthours", "Energy produced today, in Wh"))?;
        // Should only grow, but the device doesn't guarantee it, hence a gauge rather than a counter:
        let energy_lifetime = options
            .export_lifetime
            .then(|| {
                IntGauge::with_opts(opts(
                    "energy_lifetime_watthours",
                    "Energy produced in the system's lifetime, in Wh",
                ))
            })
            .transpose()?;
        let local_time =
            GaugeVec::new(opts("local_time", "Local time (hour and fractional minute)"), &["tz"])?;

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(power_production.clone()))?;
        registry.register(Box::new(energy_today.clone()))?;
        if let Some(energy_lifetime) = &energy_lifetime {
            registry.register(Box::new(energy_lifetime.clone()))?;
        }
        registry.register(Box::new(local_time.clone()))?;

        let gauges = Gauges { up, power_production, energy_today, energy_lifetime, local_time };
        Ok(Self { registry, gauges: Mutex::new(gauges) })
    }

    /// Render the telemetry in the text exposition format.
    ///
    /// Numeric gauges read zero unless the last cycle succeeded.
    #[instrument(skip_all, fields(cycle = telemetry.cycle))]
    pub fn render(&self, telemetry: &Telemetry) -> Result<String> {
        let gauges =
            self.gauges.lock().map_err(|_| anyhow::anyhow!("the metrics lock is poisoned"))?;

        let snapshot = &telemetry.snapshot;
        gauges.up.set(i64::from(snapshot.healthy));
        gauges.power_production.set(snapshot.power_now().to_gauge());
        gauges.energy_today.set(snapshot.energy_today().to_gauge());
        if let Some(energy_lifetime) = &gauges.energy_lifetime {
            energy_lifetime.set(snapshot.energy_lifetime().to_gauge());
        }
        gauges.local_time.reset();
        for (zone, hours) in &telemetry.local_times {
            gauges.local_time.with_label_values(&[zone.as_str()]).set(*hours);
        }

        let rendered = TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .context("failed to encode the metrics")?;
        drop(gauges);
        Ok(rendered)
    }
}
