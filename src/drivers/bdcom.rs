/*!
BDCOM optical line terminals.

All three board families share port naming, FDB handling and the neighbor
rules; they differ in where the active-terminal figures and the deregistration
records live, which is what `OpticalTechnology` selects.
*/

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::{
    DeviceDriver, DriverContext, DriverResult, FdbSource, IF_NAME, OpticalTechnology, PortNaming, Vendor,
    VendorProfile, oid,
};
use crate::{
    network::mac::MacAddress,
    outage::{
        correlator::{DeregistrationLog, PowerDiagnostics},
        stamp::decode_timestamp,
    },
};

/// Online ONU count per EPON port.
pub const EPON_ONLINE_ONU_COUNT: &str = "1.3.6.1.4.1.3320.101.6.1.1.21";
/// Online ONT count per GPON port.
pub const GPON_ONLINE_ONT_COUNT: &str = "1.3.6.1.4.1.3320.10.2.6.1.4";
/// Per-ONU status on the legacy boards, which have no aggregate counter.
pub const LEGACY_ONU_STATUS: &str = "1.3.6.1.4.1.3320.101.10.1.1.26";
pub const LEGACY_ONU_REGISTERED: i64 = 3;
pub const EPON_ONU_DEREGISTER_TIME: &str = "1.3.6.1.4.1.3320.101.11.1.1.11";
pub const GPON_ONT_DEREGISTER_TIME: &str = "1.3.6.1.4.1.3320.10.3.1.1.39";

static UPLINK_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T?GigaEthernet\d+/\d+$").expect("static port pattern"));

static PROFILE: VendorProfile = VendorProfile {
    port_name_oid: IF_NAME,
    port_naming: PortNaming::Pattern(&UPLINK_PORT),
    neighbor_tokens: &["sw-", "gw-", "olt-", "sr-"],
    fdb: FdbSource::Dot1qAllVlans,
    translate_bridge_ports: true,
};

pub struct Bdcom {
    ctx: DriverContext,
    technology: OpticalTechnology,
}

impl Bdcom {
    pub fn new(ctx: DriverContext, technology: OpticalTechnology) -> Self {
        Self { ctx, technology }
    }

    fn deregistration_oid(&self) -> &'static str {
        match self.technology {
            OpticalTechnology::Gpon => GPON_ONT_DEREGISTER_TIME,
            OpticalTechnology::Epon | OpticalTechnology::LegacyBoard => EPON_ONU_DEREGISTER_TIME,
        }
    }

    async fn sum_counters(&self, column: &str) -> DriverResult<u64> {
        let rows = self.ctx.transport.bulk_walk(&oid(column)?).await?;
        let total = rows
            .iter()
            .filter_map(|row| row.value.as_i64())
            .filter_map(|count| u64::try_from(count).ok())
            .sum();
        Ok(total)
    }
}

#[async_trait]
impl DeviceDriver for Bdcom {
    fn vendor(&self) -> Vendor {
        Vendor::Bdcom(self.technology)
    }

    fn profile(&self) -> &'static VendorProfile {
        &PROFILE
    }

    fn context(&self) -> &DriverContext {
        &self.ctx
    }

    async fn terminal_active_count(&self) -> DriverResult<u64> {
        let count = match self.technology {
            OpticalTechnology::Epon => self.sum_counters(EPON_ONLINE_ONU_COUNT).await?,
            OpticalTechnology::Gpon => self.sum_counters(GPON_ONLINE_ONT_COUNT).await?,
            OpticalTechnology::LegacyBoard => {
                let rows = self.ctx.transport.bulk_walk(&oid(LEGACY_ONU_STATUS)?).await?;
                let registered = rows
                    .iter()
                    .filter(|row| row.value.as_i64() == Some(LEGACY_ONU_REGISTERED))
                    .count();
                u64::try_from(registered).unwrap_or(u64::MAX)
            }
        };
        debug!(address = %self.ctx.address(), technology = ?self.technology, count, "active terminals");
        Ok(count)
    }

    fn power_diagnostics(&self) -> Option<&dyn PowerDiagnostics> {
        Some(self)
    }
}

#[async_trait]
impl PowerDiagnostics for Bdcom {
    async fn deregistration_times(&self) -> DriverResult<DeregistrationLog> {
        let rows = self.ctx.transport.bulk_walk(&oid(self.deregistration_oid())?).await?;

        let mut log = DeregistrationLog::default();
        for row in rows {
            let Some(mac) = MacAddress::from_oid_suffix(&row.oid) else {
                log.rejected += 1;
                continue;
            };
            let decoded = match row.value.as_bytes() {
                Some(bytes) => decode_timestamp(bytes).map_err(|e| e.to_string()),
                None => Err(format!("unexpected value {:?}", row.value)),
            };
            match decoded {
                Ok(ts) => {
                    log.records.insert(mac, ts);
                }
                Err(reason) => {
                    warn!(address = %self.ctx.address(), %mac, %reason, "skipping deregistration record");
                    log.rejected += 1;
                }
            }
        }
        Ok(log)
    }
}
