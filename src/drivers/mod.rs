/*!
Vendor device drivers.

Every supported switch/OLT family normalizes its SNMP dialect into the one
capability contract defined here, `DeviceDriver`. Most of the contract is
implemented once, as default methods driven by a per-vendor `VendorProfile`
(object identifiers, physical port naming, neighbor tokens, FDB flavour);
concrete drivers only supply the profile and override what genuinely differs
(optical terminal counting, power diagnostics).

Per-port operations reuse the port list enumerated once per driver instance,
so a vendor's native numbering (zero based, one based or sparse) is applied
consistently for the whole poll.
*/

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::Display,
    net::IpAddr,
    sync::Arc,
};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use crate::{
    data_aquisition::core::{ObjectId, SnmpTransport, TransportError, VarBind},
    network::{
        device::DeviceIdentity,
        mac::{MacAddress, MacTable},
        port::{PortRole, PortStatus, classify, is_manual},
    },
    outage::correlator::PowerDiagnostics,
};

pub mod bdcom;
pub mod dlink;
pub mod edgecore;
pub mod factory;
pub mod zyxel;

pub const IF_OPER_STATUS: &str = "1.3.6.1.2.1.2.2.1.8";
pub const IF_DESCR: &str = "1.3.6.1.2.1.2.2.1.2";
pub const IF_NAME: &str = "1.3.6.1.2.1.31.1.1.1.1";
pub const IF_ALIAS: &str = "1.3.6.1.2.1.31.1.1.1.18";
pub const DOT1Q_TP_FDB_PORT: &str = "1.3.6.1.2.1.17.7.1.2.2.1.2";
pub const DOT1D_TP_FDB_PORT: &str = "1.3.6.1.2.1.17.4.3.1.2";
pub const DOT1D_BASE_PORT_IF_INDEX: &str = "1.3.6.1.2.1.17.1.4.1.2";

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{address}: malformed {what}")]
    Malformed { address: IpAddr, what: String },
}

pub type DriverResult<T> = Result<T, DriverError>;

pub(crate) fn oid(s: &str) -> DriverResult<ObjectId> {
    Ok(s.parse()?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpticalTechnology {
    Epon,
    Gpon,
    LegacyBoard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vendor {
    Dlink,
    EdgeCore,
    Zyxel,
    Bdcom(OpticalTechnology),
}

impl Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vendor::Dlink => f.write_str("D-Link"),
            Vendor::EdgeCore => f.write_str("EdgeCore"),
            Vendor::Zyxel => f.write_str("Zyxel"),
            Vendor::Bdcom(OpticalTechnology::Epon) => f.write_str("BDCOM EPON"),
            Vendor::Bdcom(OpticalTechnology::Gpon) => f.write_str("BDCOM GPON"),
            Vendor::Bdcom(OpticalTechnology::LegacyBoard) => f.write_str("BDCOM legacy board"),
        }
    }
}

/// How a vendor names its physical ports in the interface table.
pub enum PortNaming {
    /// `1/12`: exactly one slash, numeric module and port.
    ModuleSlashPort,
    /// `Port12` / `Port 12`
    PortPrefixed,
    /// Fixed literal prefix, anything after it.
    Prefix(&'static str),
    Pattern(&'static Lazy<Regex>),
}

impl PortNaming {
    pub fn matches(&self, name: &str) -> bool {
        let name = name.trim();
        match self {
            PortNaming::ModuleSlashPort => match name.split_once('/') {
                Some((module, port)) => {
                    !port.contains('/')
                        && !module.is_empty()
                        && !port.is_empty()
                        && module.chars().all(|c| c.is_ascii_digit())
                        && port.chars().all(|c| c.is_ascii_digit())
                }
                None => false,
            },
            PortNaming::PortPrefixed => name
                .strip_prefix("Port")
                .map(str::trim_start)
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())),
            PortNaming::Prefix(prefix) => name.starts_with(prefix),
            PortNaming::Pattern(regex) => regex.is_match(name),
        }
    }
}

/// Where the forwarding database lives and how it is scoped.
pub enum FdbSource {
    /// Q-BRIDGE table restricted to the management VLAN.
    Dot1qManagementVlan,
    /// Q-BRIDGE table across all VLANs.
    Dot1qAllVlans,
    /// Plain BRIDGE-MIB table.
    Dot1d,
}

pub struct VendorProfile {
    /// Column holding the interface names the naming rule is applied to.
    pub port_name_oid: &'static str,
    pub port_naming: PortNaming,
    pub neighbor_tokens: &'static [&'static str],
    pub fdb: FdbSource,
    /// FDB values are bridge port numbers that must be mapped to ifIndex.
    pub translate_bridge_ports: bool,
}

/// Discovery knobs that shape driver behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverSettings {
    pub management_vlan: u16,
    /// Neighbor identifiers containing one of these are reported, not descended into.
    pub manual_markers: Vec<String>,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            management_vlan: 111,
            manual_markers: vec!["-bkp".to_string()],
        }
    }
}

/// Per-poll state shared by all operations of one driver instance.
pub struct DriverContext {
    pub identity: DeviceIdentity,
    pub transport: Arc<dyn SnmpTransport>,
    pub settings: Arc<DriverSettings>,
    ports: OnceCell<Vec<u32>>,
    roles: OnceCell<BTreeMap<u32, PortRole>>,
}

impl DriverContext {
    pub fn new(identity: DeviceIdentity, transport: Arc<dyn SnmpTransport>, settings: Arc<DriverSettings>) -> Self {
        Self {
            identity,
            transport,
            settings,
            ports: OnceCell::new(),
            roles: OnceCell::new(),
        }
    }

    pub fn address(&self) -> IpAddr {
        self.identity.address
    }
}

/// The port facing the parent device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Uplink {
    pub port: u32,
    /// Classification of the uplink's own description, `None` if the device has none for it.
    pub role: Option<PortRole>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Neighbors {
    /// Children the traversal descends into.
    pub traversable: BTreeSet<String>,
    /// Guarded names left for manual handling.
    pub manual: BTreeSet<String>,
}

/// Uniform capability contract over all vendor dialects.
#[async_trait]
pub trait DeviceDriver: Send + Sync {
    fn vendor(&self) -> Vendor;
    fn profile(&self) -> &'static VendorProfile;
    fn context(&self) -> &DriverContext;

    fn address(&self) -> IpAddr {
        self.context().address()
    }

    /// Native indexes of the physical ports, in interface-table order.
    async fn port_indices(&self) -> DriverResult<Vec<u32>> {
        let ctx = self.context();
        let profile = self.profile();
        let ports = ctx
            .ports
            .get_or_try_init(|| async move {
                let names = ctx.transport.walk(&oid(profile.port_name_oid)?).await?;
                let ports = physical_ports(&names, &profile.port_naming);
                debug!(address = %ctx.address(), ports = ports.len(), "enumerated physical ports");
                Ok::<_, DriverError>(ports)
            })
            .await?;
        Ok(ports.clone())
    }

    async fn port_count(&self) -> DriverResult<usize> {
        Ok(self.port_indices().await?.len())
    }

    /// One scalar fetch per port. Ports that report no status are left out.
    async fn port_status(&self) -> DriverResult<BTreeMap<u32, PortStatus>> {
        let ctx = self.context();
        let column = oid(IF_OPER_STATUS)?;
        let mut out = BTreeMap::new();
        for port in self.port_indices().await? {
            match ctx.transport.get(&column.child(u64::from(port))).await?.as_i64() {
                Some(value) => {
                    out.insert(port, PortStatus::from_oper_status(value));
                }
                None => trace!(address = %ctx.address(), port, "no oper status"),
            }
        }
        Ok(out)
    }

    /// Classification of a single port, `None` if it has no description.
    async fn port_description(&self, port: u32) -> DriverResult<Option<PortRole>> {
        let ctx = self.context();
        if let Some(roles) = ctx.roles.get() {
            return Ok(roles.get(&port).cloned());
        }
        let value = ctx.transport.get(&oid(IF_ALIAS)?.child(u64::from(port))).await?;
        Ok(value.as_text().map(|text| classify(&text, self.profile().neighbor_tokens)))
    }

    /// Classification of every port that has a description. Computed once per poll.
    async fn port_descriptions(&self) -> DriverResult<BTreeMap<u32, PortRole>> {
        let ctx = self.context();
        let ports = self.port_indices().await?;
        let tokens = self.profile().neighbor_tokens;
        let roles = ctx
            .roles
            .get_or_try_init(|| async move {
                let column = oid(IF_ALIAS)?;
                let mut roles = BTreeMap::new();
                for port in ports {
                    if let Some(text) = ctx.transport.get(&column.child(u64::from(port))).await?.as_text() {
                        roles.insert(port, classify(&text, tokens));
                    }
                }
                Ok::<_, DriverError>(roles)
            })
            .await?;
        Ok(roles.clone())
    }

    async fn mac_table(&self) -> DriverResult<MacTable> {
        read_mac_table(self.context(), self.profile()).await
    }

    /// First port, in enumeration order, whose learned MACs include a core MAC.
    async fn find_uplink(&self) -> DriverResult<Option<Uplink>> {
        let ctx = self.context();
        let table = self.mac_table().await?;
        let Some(port) = table.first_port_with_any(&ctx.identity.core_macs) else {
            return Ok(None);
        };
        let role = self.port_description(port).await?;
        debug!(address = %ctx.address(), port, "uplink found");
        Ok(Some(Uplink { port, role }))
    }

    async fn neighbors(&self) -> DriverResult<Neighbors> {
        let uplink = self.find_uplink().await?;
        let roles = self.port_descriptions().await?;
        Ok(split_neighbors(&roles, uplink.as_ref(), &self.context().settings.manual_markers))
    }

    /// Ports that are up and classified client, plus optical terminals where applicable.
    async fn active_user_count(&self) -> DriverResult<u64> {
        let statuses = self.port_status().await?;
        let roles = self.port_descriptions().await?;
        let clients = count_active_clients(&statuses, &roles);
        let terminals = self.terminal_active_count().await?;
        Ok(clients + terminals)
    }

    /// Active optical terminals; switches have none.
    async fn terminal_active_count(&self) -> DriverResult<u64> {
        Ok(0)
    }

    fn power_diagnostics(&self) -> Option<&dyn PowerDiagnostics> {
        None
    }
}

/// Interface indexes whose name matches the vendor's physical port naming.
pub fn physical_ports(names: &[VarBind], naming: &PortNaming) -> Vec<u32> {
    names
        .iter()
        .filter(|varbind| varbind.value.as_text().is_some_and(|name| naming.matches(&name)))
        .filter_map(|varbind| varbind.oid.last().and_then(|index| u32::try_from(index).ok()))
        .collect()
}

/// |{p : status(p) = up ∧ role(p) = client}|; ports missing either are ignored.
pub fn count_active_clients(statuses: &BTreeMap<u32, PortStatus>, roles: &BTreeMap<u32, PortRole>) -> u64 {
    let count = statuses
        .iter()
        .filter(|(port, status)| **status == PortStatus::Up && roles.get(*port).is_some_and(PortRole::is_client))
        .count();
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Neighbor identifiers minus the uplink (it is the parent), split by the manual-handling rule.
pub fn split_neighbors(roles: &BTreeMap<u32, PortRole>, uplink: Option<&Uplink>, manual_markers: &[String]) -> Neighbors {
    let uplink_port = uplink.map(|u| u.port);
    let uplink_name = uplink.and_then(|u| u.role.as_ref()).and_then(PortRole::neighbor_name);

    let mut neighbors = Neighbors::default();
    for (port, role) in roles {
        let Some(name) = role.neighbor_name() else {
            continue;
        };
        if Some(*port) == uplink_port || Some(name) == uplink_name {
            continue;
        }
        if is_manual(name, manual_markers) {
            neighbors.manual.insert(name.to_string());
        } else {
            neighbors.traversable.insert(name.to_string());
        }
    }
    neighbors
}

/// Builds a MAC table from FDB rows: trailing six sub-identifiers are the MAC,
/// the value is the owning port. `bridge_ports` maps bridge port numbers to ifIndex.
pub fn parse_fdb(rows: &[VarBind], bridge_ports: Option<&HashMap<u32, u32>>) -> MacTable {
    rows.iter()
        .filter_map(|row| {
            let mac = MacAddress::from_oid_suffix(&row.oid)?;
            let port = u32::try_from(row.value.as_i64()?).ok()?;
            let port = bridge_ports.and_then(|map| map.get(&port).copied()).unwrap_or(port);
            Some((port, mac))
        })
        .collect()
}

async fn read_mac_table(ctx: &DriverContext, profile: &VendorProfile) -> DriverResult<MacTable> {
    let rows = match profile.fdb {
        FdbSource::Dot1qManagementVlan => {
            let prefix = oid(DOT1Q_TP_FDB_PORT)?.child(u64::from(ctx.settings.management_vlan));
            ctx.transport.walk(&prefix).await?
        }
        FdbSource::Dot1qAllVlans => ctx.transport.bulk_walk(&oid(DOT1Q_TP_FDB_PORT)?).await?,
        FdbSource::Dot1d => ctx.transport.walk(&oid(DOT1D_TP_FDB_PORT)?).await?,
    };

    let bridge_ports = if profile.translate_bridge_ports {
        let rows = ctx.transport.walk(&oid(DOT1D_BASE_PORT_IF_INDEX)?).await?;
        let map: HashMap<u32, u32> = rows
            .iter()
            .filter_map(|row| {
                let bridge_port = u32::try_from(row.oid.last()?).ok()?;
                let if_index = u32::try_from(row.value.as_i64()?).ok()?;
                Some((bridge_port, if_index))
            })
            .collect();
        Some(map)
    } else {
        None
    };

    let table = parse_fdb(&rows, bridge_ports.as_ref());
    trace!(address = %ctx.address(), rows = rows.len(), ports = table.len(), "read forwarding database");
    Ok(table)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_aquisition::core::SnmpValue;

    static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^eth\d+$").unwrap());

    fn name(index: u64, text: &str) -> VarBind {
        VarBind {
            oid: oid(IF_NAME).unwrap().child(index),
            value: SnmpValue::OctetString(text.as_bytes().to_vec()),
        }
    }

    #[test]
    fn test_port_naming_rules() {
        assert!(PortNaming::ModuleSlashPort.matches("1/12"));
        assert!(!PortNaming::ModuleSlashPort.matches("1/0/12"));
        assert!(!PortNaming::ModuleSlashPort.matches("vlan1"));
        assert!(!PortNaming::ModuleSlashPort.matches("ch/1"));
        assert!(PortNaming::PortPrefixed.matches("Port3"));
        assert!(PortNaming::PortPrefixed.matches("Port 3"));
        assert!(!PortNaming::PortPrefixed.matches("Port-Channel1"));
        assert!(PortNaming::Prefix("swp").matches("swp05"));
        assert!(PortNaming::Pattern(&DIGITS).matches("eth7"));
        assert!(!PortNaming::Pattern(&DIGITS).matches("eth7.100"));
    }

    #[test]
    fn test_physical_ports_keep_native_indexes() {
        let names = vec![name(0, "1/1"), name(1, "1/2"), name(7, "vlan111"), name(52, "1/3")];
        assert_eq!(physical_ports(&names, &PortNaming::ModuleSlashPort), vec![0, 1, 52]);
        assert!(physical_ports(&names, &PortNaming::PortPrefixed).is_empty());
    }

    #[test]
    fn test_count_active_clients_ignores_missing_data() {
        let statuses = BTreeMap::from([(1, PortStatus::Up), (2, PortStatus::Down), (3, PortStatus::Up), (4, PortStatus::Up)]);
        let roles = BTreeMap::from([
            (1, PortRole::Client),
            (2, PortRole::Client),
            (3, PortRole::Neighbor("sw-x".into())),
            (5, PortRole::Client),
        ]);
        // 4 has no description, 5 has no status
        assert_eq!(count_active_clients(&statuses, &roles), 1);
    }

    #[test]
    fn test_split_neighbors_excludes_uplink_and_manual() {
        let roles = BTreeMap::from([
            (1, PortRole::Client),
            (2, PortRole::Neighbor("sw-parent".into())),
            (3, PortRole::Neighbor("sw-child".into())),
            (4, PortRole::Neighbor("sw-ring-bkp".into())),
            (5, PortRole::Neighbor("sw-parent".into())),
        ]);
        let uplink = Uplink {
            port: 2,
            role: Some(PortRole::Neighbor("sw-parent".into())),
        };

        let neighbors = split_neighbors(&roles, Some(&uplink), &["-bkp".to_string()]);

        assert_eq!(neighbors.traversable, BTreeSet::from(["sw-child".to_string()]));
        assert_eq!(neighbors.manual, BTreeSet::from(["sw-ring-bkp".to_string()]));

        let without_uplink = split_neighbors(&roles, None, &[]);
        assert_eq!(without_uplink.traversable.len(), 3);
    }

    #[test]
    fn test_parse_fdb_translates_bridge_ports() {
        let row = |mac: [u64; 6], port: i64| VarBind {
            oid: ObjectId::new([&[1, 3, 6, 1, 2, 1, 17, 4, 3, 1, 2][..], &mac[..]].concat()),
            value: SnmpValue::Integer(port),
        };
        let rows = vec![row([0, 1, 2, 3, 4, 5], 1), row([0, 1, 2, 3, 4, 6], 1), row([0, 1, 2, 3, 4, 7], 9)];
        let bridge = HashMap::from([(1, 49)]);

        let table = parse_fdb(&rows, Some(&bridge));

        assert_eq!(table.get(49).map(|m| m.len()), Some(2));
        assert_eq!(table.get(9).map(|m| m.len()), Some(1));
        assert!(table.get(1).is_none());
    }
}
