use std::{collections::HashSet, fmt::Display, net::IpAddr, sync::Arc};

use serde::{Deserialize, Serialize};

use super::mac::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SnmpVersion {
    #[serde(rename = "1")]
    V1,
    #[default]
    #[serde(rename = "2c")]
    V2c,
}

impl Display for SnmpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnmpVersion::V1 => f.write_str("1"),
            SnmpVersion::V2c => f.write_str("2c"),
        }
    }
}

/// Community-based credentials shared by every device of one traversal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub community: String,
    #[serde(default)]
    pub version: SnmpVersion,
}

impl Credentials {
    pub fn new(community: &str, version: SnmpVersion) -> Self {
        Self {
            community: community.to_string(),
            version,
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("public", SnmpVersion::V2c)
    }
}

/// Everything needed to talk to one device during one poll.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub address: IpAddr,
    pub credentials: Credentials,
    /// MAC addresses of the core device; whichever local port learned one of them is the uplink.
    pub core_macs: Arc<HashSet<MacAddress>>,
}

impl DeviceIdentity {
    pub fn new(address: IpAddr, credentials: Credentials, core_macs: Arc<HashSet<MacAddress>>) -> Self {
        Self {
            address,
            credentials,
            core_macs,
        }
    }
}
