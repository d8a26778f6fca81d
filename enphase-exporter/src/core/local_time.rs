use std::collections::{BTreeMap, btree_map};

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::errors::ConfigError;

/// Configured time zones, resolved once at startup.
///
/// Keyed by the identifier as configured, which is also the exported label value.
#[must_use]
#[derive(Clone, Debug, Default)]
pub struct TimeZoneTable(BTreeMap<String, Tz>);

impl TimeZoneTable {
    /// Resolve every identifier, skipping blank ones.
    pub fn try_from_ids<I, S>(ids: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut zones = BTreeMap::new();
        for id in ids {
            let id = id.as_ref().trim();
            if id.is_empty() {
                continue;
            }
            let zone =
                id.parse::<Tz>().map_err(|_| ConfigError::UnknownTimeZone(id.to_owned()))?;
            zones.insert(id.to_owned(), zone);
        }
        Ok(Self(zones))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Local wall-clock time per configured zone, as fractional hours in `[0, 24)`.
///
/// Recomputed from scratch every cycle.
#[must_use]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalTimeReading(BTreeMap<String, f64>);

impl LocalTimeReading {
    pub fn compute(table: &TimeZoneTable, now: DateTime<Utc>) -> Self {
        Self(table.0.iter().map(|(id, zone)| (id.clone(), fractional_hour(zone, now))).collect())
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<f64> {
        self.0.get(id).copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, f64> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a LocalTimeReading {
    type Item = (&'a String, &'a f64);
    type IntoIter = btree_map::Iter<'a, String, f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Seconds are discarded.
fn fractional_hour<Z: TimeZone>(zone: &Z, now: DateTime<Utc>) -> f64 {
    let local = now.with_timezone(zone);
    f64::from(local.hour()) + f64::from(local.minute()) / 60.0
}
