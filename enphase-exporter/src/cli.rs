use std::time::Duration;

use clap::{ArgAction, Parser};

use crate::{
    core::{local_time::TimeZoneTable, poller::TriggerMode},
    errors::ConfigError,
    metrics::MetricsOptions,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    /// Envoy address, `host[:port]`.
    #[clap(long = "enphase-address", env = "ENPHASE_ADDRESS")]
    pub enphase_address: String,

    /// Port to serve the metrics on.
    #[clap(long, env = "PORT")]
    pub port: u16,

    /// Comma-separated time zones to export the local time for.
    #[clap(long, env = "TIMEZONES", value_delimiter = ',')]
    pub timezones: Vec<String>,

    #[clap(long, env = "TRIGGER_MODE", value_enum, default_value_t = TriggerMode::Timer)]
    pub mode: TriggerMode,

    /// Cycle period in the timer mode.
    #[clap(long, env = "POLLING_INTERVAL", default_value = "1min")]
    pub polling_interval: humantime::Duration,

    #[clap(long, env = "FETCH_TIMEOUT", default_value = "5s")]
    pub fetch_timeout: humantime::Duration,

    #[clap(flatten)]
    pub metrics: MetricsArgs,
}

impl Args {
    pub fn time_zones(&self) -> Result<TimeZoneTable, ConfigError> {
        TimeZoneTable::try_from_ids(&self.timezones)
    }

    pub fn polling_interval(&self) -> Duration {
        self.polling_interval.into()
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout.into()
    }
}

#[derive(Parser)]
pub struct MetricsArgs {
    /// Metric name prefix.
    #[clap(long = "namespace", env = "METRICS_NAMESPACE")]
    pub namespace: Option<String>,

    #[clap(
        long = "export-lifetime",
        env = "EXPORT_LIFETIME",
        default_value = "true",
        action = ArgAction::Set,
    )]
    pub export_lifetime: bool,
}

impl MetricsArgs {
    pub fn options(&self) -> MetricsOptions {
        MetricsOptions::builder()
            .maybe_namespace(self.namespace.clone())
            .export_lifetime(self.export_lifetime)
            .build()
    }
}
