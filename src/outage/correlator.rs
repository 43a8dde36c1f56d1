use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeDelta, Timelike};
use serde::Deserialize;

use crate::{config::duration_str, drivers::DriverResult, network::mac::MacAddress};

/// Terminal MAC -> decoded deregistration time, rebuilt on every read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeregistrationLog {
    pub records: BTreeMap<MacAddress, NaiveDateTime>,
    /// Terminals whose record failed to decode; they are left out of `records`.
    pub rejected: usize,
}

/// Optical power diagnostics, implemented by OLT drivers.
#[async_trait]
pub trait PowerDiagnostics: Send + Sync {
    async fn deregistration_times(&self) -> DriverResult<DeregistrationLog>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutageSettings {
    /// Trailing window, ending at `now`, in which deregistrations are considered.
    #[serde(with = "duration_str")]
    pub window: Duration,
    /// Distinct terminals in one minute bucket that count as a mass deregistration.
    pub min_terminals: usize,
}

impl Default for OutageSettings {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10 * 60),
            min_terminals: 2,
        }
    }
}

impl OutageSettings {
    /// Minute buckets inside the window holding at least `min_terminals` terminals.
    pub fn correlated_buckets(
        &self,
        records: &BTreeMap<MacAddress, NaiveDateTime>,
        now: NaiveDateTime,
    ) -> BTreeMap<NaiveDateTime, BTreeSet<MacAddress>> {
        let window = TimeDelta::from_std(self.window).unwrap_or(TimeDelta::MAX);
        let oldest = now.checked_sub_signed(window).unwrap_or(NaiveDateTime::MIN);

        let mut buckets: BTreeMap<NaiveDateTime, BTreeSet<MacAddress>> = BTreeMap::new();
        for (mac, ts) in records {
            if *ts < oldest || *ts > now {
                continue;
            }
            buckets.entry(floor_to_minute(*ts)).or_default().insert(*mac);
        }
        buckets.retain(|_, terminals| terminals.len() >= self.min_terminals.max(1));
        buckets
    }

    pub fn has_correlated_outage(&self, records: &BTreeMap<MacAddress, NaiveDateTime>, now: NaiveDateTime) -> bool {
        !self.correlated_buckets(records, now).is_empty()
    }
}

/// Default policy: two or more terminals dropping in the same minute within the last ten minutes.
pub fn has_correlated_outage(records: &BTreeMap<MacAddress, NaiveDateTime>, now: NaiveDateTime) -> bool {
    OutageSettings::default().has_correlated_outage(records, now)
}

fn floor_to_minute(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(ts)
}
