/*!
Driver selection from the device's live identification string.

The signature table is ordered; the first entry whose fragments all match wins.
Overlapping signatures therefore rely on position: the legacy BDCOM board
reports `EPON` as well, so its revision fragment is checked first.
*/

use std::{fmt::Display, sync::Arc};

use tracing::{debug, info, warn};

use super::{
    DeviceDriver, DriverContext, DriverSettings, OpticalTechnology, Vendor, bdcom::Bdcom, dlink::Dlink,
    edgecore::EdgeCore, oid, zyxel::Zyxel,
};
use crate::{
    data_aquisition::core::{SnmpTransport, TransportConnector},
    network::device::DeviceIdentity,
};

/// sysDescr.0
pub const SYS_DESCR: &str = "1.3.6.1.2.1.1.1.0";

pub struct Signature {
    /// Any of these identifies the vendor.
    pub vendor_fragments: &'static [&'static str],
    /// Secondary fragment that must also be present, used to pick among sibling drivers.
    pub technology_fragment: Option<&'static str>,
    pub vendor: Vendor,
}

impl Signature {
    pub fn matches(&self, descr: &str) -> bool {
        self.vendor_fragments.iter().any(|fragment| descr.contains(fragment))
            && self.technology_fragment.is_none_or(|fragment| descr.contains(fragment))
    }
}

pub static SIGNATURES: &[Signature] = &[
    Signature {
        vendor_fragments: &["D-Link", "DES-", "DGS-"],
        technology_fragment: None,
        vendor: Vendor::Dlink,
    },
    Signature {
        vendor_fragments: &["Edge-Core", "EdgeCore", "ECS"],
        technology_fragment: None,
        vendor: Vendor::EdgeCore,
    },
    Signature {
        vendor_fragments: &["ZyXEL", "Zyxel"],
        technology_fragment: None,
        vendor: Vendor::Zyxel,
    },
    Signature {
        vendor_fragments: &["BDCOM"],
        technology_fragment: Some("P3310B"),
        vendor: Vendor::Bdcom(OpticalTechnology::LegacyBoard),
    },
    Signature {
        vendor_fragments: &["BDCOM"],
        technology_fragment: Some("GPON"),
        vendor: Vendor::Bdcom(OpticalTechnology::Gpon),
    },
    Signature {
        vendor_fragments: &["BDCOM"],
        technology_fragment: Some("EPON"),
        vendor: Vendor::Bdcom(OpticalTechnology::Epon),
    },
];

/// First matching vendor for an identification string.
pub fn match_signature(descr: &str) -> Option<Vendor> {
    SIGNATURES.iter().find(|signature| signature.matches(descr)).map(|signature| signature.vendor)
}

/// Why a device produced no driver. Both cases make the node a zero-count leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unrecognized {
    /// Identification exchange failed (after transport retries).
    Unreachable(String),
    /// Answered, but no signature matched the identification string.
    UnknownSignature(String),
}

impl Display for Unrecognized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unrecognized::Unreachable(reason) => write!(f, "unreachable: {reason}"),
            Unrecognized::UnknownSignature(descr) => write!(f, "unknown device: {descr:?}"),
        }
    }
}

pub struct DriverFactory {
    connector: Arc<dyn TransportConnector>,
    settings: Arc<DriverSettings>,
}

impl DriverFactory {
    pub fn new(connector: Arc<dyn TransportConnector>, settings: Arc<DriverSettings>) -> Self {
        Self { connector, settings }
    }

    /// Opens a session, reads the identification string and instantiates the matching driver.
    /// Transport failures never escape; they come back as `Unrecognized::Unreachable`.
    pub async fn identify(&self, identity: DeviceIdentity) -> Result<Box<dyn DeviceDriver>, Unrecognized> {
        let transport = self
            .connector
            .connect(&identity)
            .await
            .map_err(|e| Unrecognized::Unreachable(e.to_string()))?;

        let descr = self.read_descr(transport.as_ref()).await.inspect_err(|reason| {
            warn!(address = %identity.address, %reason, "identification failed");
        })?;

        let Some(vendor) = match_signature(&descr) else {
            info!(address = %identity.address, %descr, "no driver for device");
            return Err(Unrecognized::UnknownSignature(descr));
        };
        debug!(address = %identity.address, %vendor, "driver selected");

        let ctx = DriverContext::new(identity, transport, Arc::clone(&self.settings));
        Ok(build_driver(vendor, ctx))
    }

    async fn read_descr(&self, transport: &dyn SnmpTransport) -> Result<String, Unrecognized> {
        let sys_descr = oid(SYS_DESCR).map_err(|e| Unrecognized::Unreachable(e.to_string()))?;
        let value = transport
            .get(&sys_descr)
            .await
            .map_err(|e| Unrecognized::Unreachable(e.to_string()))?;
        value
            .as_text()
            .ok_or_else(|| Unrecognized::UnknownSignature(format!("{value:?}")))
    }
}

pub fn build_driver(vendor: Vendor, ctx: DriverContext) -> Box<dyn DeviceDriver> {
    match vendor {
        Vendor::Dlink => Box::new(Dlink::new(ctx)),
        Vendor::EdgeCore => Box::new(EdgeCore::new(ctx)),
        Vendor::Zyxel => Box::new(Zyxel::new(ctx)),
        Vendor::Bdcom(technology) => Box::new(Bdcom::new(ctx, technology)),
    }
}
