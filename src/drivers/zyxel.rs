use async_trait::async_trait;

use super::{DeviceDriver, DriverContext, FdbSource, IF_NAME, PortNaming, Vendor, VendorProfile};

static PROFILE: VendorProfile = VendorProfile {
    port_name_oid: IF_NAME,
    port_naming: PortNaming::Prefix("swp"),
    neighbor_tokens: &["sw-", "gw-"],
    fdb: FdbSource::Dot1d,
    translate_bridge_ports: true,
};

/// Zyxel MES/GS access switches. Ports are zero based (`swp00`), FDB values are bridge ports.
pub struct Zyxel {
    ctx: DriverContext,
}

impl Zyxel {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DeviceDriver for Zyxel {
    fn vendor(&self) -> Vendor {
        Vendor::Zyxel
    }

    fn profile(&self) -> &'static VendorProfile {
        &PROFILE
    }

    fn context(&self) -> &DriverContext {
        &self.ctx
    }
}
