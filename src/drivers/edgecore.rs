use async_trait::async_trait;

use super::{DeviceDriver, DriverContext, FdbSource, IF_DESCR, PortNaming, Vendor, VendorProfile};

/// ECS series name their front ports `Port1`, `Port2`, ... in ifDescr.
static PROFILE: VendorProfile = VendorProfile {
    port_name_oid: IF_DESCR,
    port_naming: PortNaming::PortPrefixed,
    neighbor_tokens: &["sw-", "gw-", "olt-"],
    fdb: FdbSource::Dot1qManagementVlan,
    translate_bridge_ports: false,
};

pub struct EdgeCore {
    ctx: DriverContext,
}

impl EdgeCore {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DeviceDriver for EdgeCore {
    fn vendor(&self) -> Vendor {
        Vendor::EdgeCore
    }

    fn profile(&self) -> &'static VendorProfile {
        &PROFILE
    }

    fn context(&self) -> &DriverContext {
        &self.ctx
    }
}
