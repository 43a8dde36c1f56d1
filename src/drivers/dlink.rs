use async_trait::async_trait;

use super::{DeviceDriver, DriverContext, FdbSource, IF_NAME, PortNaming, Vendor, VendorProfile};

static PROFILE: VendorProfile = VendorProfile {
    port_name_oid: IF_NAME,
    port_naming: PortNaming::ModuleSlashPort,
    neighbor_tokens: &["sw-", "gw-", "sr-te"],
    fdb: FdbSource::Dot1qManagementVlan,
    translate_bridge_ports: false,
};

/// D-Link DES/DGS access switches.
pub struct Dlink {
    ctx: DriverContext,
}

impl Dlink {
    pub fn new(ctx: DriverContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl DeviceDriver for Dlink {
    fn vendor(&self) -> Vendor {
        Vendor::Dlink
    }

    fn profile(&self) -> &'static VendorProfile {
        &PROFILE
    }

    fn context(&self) -> &DriverContext {
        &self.ctx
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        data_aquisition::replay::ReplayAgent,
        drivers::test_support::context,
        network::port::{PortRole, PortStatus},
    };

    fn des3200() -> Dlink {
        let dump = include_str!("../../test_data/dlink_des3200.walk");
        Dlink::new(context(ReplayAgent::from_dump("10.69.111.53".parse().unwrap(), dump)))
    }

    #[tokio::test]
    async fn test_port_enumeration() {
        let switch = des3200();
        assert_eq!(switch.port_count().await.unwrap(), 10);
        let ports = switch.port_indices().await.unwrap();
        assert_eq!(ports.first(), Some(&1));
        assert_eq!(ports.last(), Some(&10));
    }

    #[tokio::test]
    async fn test_status_and_descriptions() {
        let switch = des3200();
        let statuses = switch.port_status().await.unwrap();
        assert_eq!(statuses.get(&1), Some(&PortStatus::Up));
        assert_eq!(statuses.get(&2), Some(&PortStatus::Down));
        // port 9 has no oper status in the dump
        assert_eq!(statuses.get(&9), None);

        assert_eq!(switch.port_description(1).await.unwrap(), Some(PortRole::Client));
        assert_eq!(switch.port_description(7).await.unwrap(), Some(PortRole::None));
        let all = switch.port_descriptions().await.unwrap();
        assert_eq!(all.get(&5), Some(&PortRole::Neighbor("sw-pr12-2".into())));
        assert_eq!(all.get(&8), None);
    }

    #[tokio::test]
    async fn test_uplink_neighbors_and_count() {
        let switch = des3200();

        let uplink = switch.find_uplink().await.unwrap().unwrap();
        assert_eq!(uplink.port, 10);
        assert_eq!(uplink.role, Some(PortRole::Neighbor("gw-pr12".into())));

        let neighbors = switch.neighbors().await.unwrap();
        assert_eq!(neighbors.traversable, BTreeSet::from(["sw-pr12-2".to_string()]));
        assert_eq!(neighbors.manual, BTreeSet::from(["sw-pr12-ring-bkp".to_string()]));

        // up clients: 1, 3, 4 (port 9 is a client without status)
        assert_eq!(switch.active_user_count().await.unwrap(), 3);
        assert!(switch.power_diagnostics().is_none());
    }

    #[tokio::test]
    async fn test_reference_example() {
        let agent = ReplayAgent::new("10.0.0.9".parse().unwrap())
            .text("1.3.6.1.2.1.31.1.1.1.1.1", "1/1")
            .text("1.3.6.1.2.1.31.1.1.1.1.2", "1/2")
            .text("1.3.6.1.2.1.31.1.1.1.1.3", "1/3")
            .int("1.3.6.1.2.1.2.2.1.8.1", 1)
            .int("1.3.6.1.2.1.2.2.1.8.2", 2)
            .int("1.3.6.1.2.1.2.2.1.8.3", 1)
            .text("1.3.6.1.2.1.31.1.1.1.18.1", "client-bob")
            .text("1.3.6.1.2.1.31.1.1.1.18.2", "client-alice")
            .text("1.3.6.1.2.1.31.1.1.1.18.3", "sw-downstream-1")
            .int("1.3.6.1.2.1.17.7.1.2.2.1.2.111.136.144.9.254.196.109", 3);
        let switch = Dlink::new(context(agent));

        assert_eq!(switch.find_uplink().await.unwrap().map(|u| u.port), Some(3));
        assert_eq!(switch.active_user_count().await.unwrap(), 1);
        assert!(switch.neighbors().await.unwrap().traversable.is_empty());
    }

    #[tokio::test]
    async fn test_no_core_mac_means_no_uplink() {
        let agent = ReplayAgent::new("10.0.0.9".parse().unwrap())
            .text("1.3.6.1.2.1.31.1.1.1.1.1", "1/1")
            .text("1.3.6.1.2.1.31.1.1.1.18.1", "sw-a")
            .int("1.3.6.1.2.1.17.7.1.2.2.1.2.111.0.1.2.3.4.5", 1);
        let switch = Dlink::new(context(agent));

        assert_eq!(switch.find_uplink().await.unwrap(), None);
        assert_eq!(switch.neighbors().await.unwrap().traversable, BTreeSet::from(["sw-a".to_string()]));
    }

    #[tokio::test]
    async fn test_empty_device_counts_zero() {
        let switch = Dlink::new(context(ReplayAgent::new("10.0.0.9".parse().unwrap())));
        assert_eq!(switch.port_count().await.unwrap(), 0);
        assert_eq!(switch.active_user_count().await.unwrap(), 0);
    }
}
