//! Layered configuration: built-in defaults, then a TOML file, then
//! `CENSUS_`-prefixed environment variables (`__` separates sections,
//! e.g. `CENSUS_SNMP__TIMEOUT=5s`).

use std::{
    collections::{BTreeMap, HashSet},
    net::IpAddr,
    path::Path,
};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use crate::{
    data_aquisition::{directory::StaticDirectory, snmp::SnmpSettings},
    drivers::DriverSettings,
    network::{device::Credentials, mac::MacAddress},
    outage::OutageSettings,
    topology::{CensusSettings, TraversalSettings},
};

pub const DEFAULT_CONFIG_FILE: &str = "census.toml";
pub const ENV_PREFIX: &str = "CENSUS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub snmp: SnmpSettings,
    pub credentials: Credentials,
    pub discovery: DiscoveryConfig,
    pub outage: OutageSettings,
    pub directory: DirectoryConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// MACs of the core routers; the port that learned one of them is a device's uplink.
    pub core_macs: Vec<MacAddress>,
    pub management_vlan: u16,
    pub manual_markers: Vec<String>,
    pub fanout: usize,
    pub max_depth: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        let drivers = DriverSettings::default();
        let traversal = TraversalSettings::default();
        Self {
            core_macs: Vec::new(),
            management_vlan: drivers.management_vlan,
            manual_markers: drivers.manual_markers,
            fanout: traversal.fanout,
            max_depth: traversal.max_depth,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Hostname -> management address.
    pub hosts: BTreeMap<String, IpAddr>,
}

impl Config {
    /// Loads `path` (missing file is fine) and the environment on top of the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, reason: &str| {
            Err(ConfigError::Validation {
                field: field.into(),
                reason: reason.into(),
            })
        };
        if self.discovery.fanout == 0 {
            return invalid("discovery.fanout", "must be at least 1");
        }
        if self.snmp.max_repetitions == 0 {
            return invalid("snmp.max_repetitions", "must be at least 1");
        }
        if self.snmp.timeout.is_zero() {
            return invalid("snmp.timeout", "must be positive");
        }
        if self.outage.min_terminals == 0 {
            return invalid("outage.min_terminals", "must be at least 1");
        }
        if self.credentials.community.is_empty() {
            return invalid("credentials.community", "must not be empty");
        }
        Ok(())
    }

    pub fn census_settings(&self) -> CensusSettings {
        CensusSettings {
            credentials: self.credentials.clone(),
            core_macs: self.discovery.core_macs.iter().copied().collect::<HashSet<_>>(),
            traversal: TraversalSettings {
                fanout: self.discovery.fanout,
                max_depth: self.discovery.max_depth,
            },
            drivers: DriverSettings {
                management_vlan: self.discovery.management_vlan,
                manual_markers: self.discovery.manual_markers.clone(),
            },
            outage: self.outage.clone(),
        }
    }

    pub fn directory(&self) -> StaticDirectory {
        StaticDirectory::new(self.directory.hosts.clone())
    }
}

/// Serde adapter for human-readable durations (`"2s"`, `"500ms"`, `"10m"`).
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}
