/*!
Recursive discovery and aggregation of active-subscriber counts.

Starting from a root address, each node is identified through the driver
factory, counted, and its downstream neighbors are resolved through the
directory and visited in turn. Siblings are polled concurrently; one semaphore
per traversal caps how many devices are being talked to at once, whatever the
depth. A node holds its permit while it is identified and counted and gives it
back before descending. Every branch returns its own report and sums are only
combined at the join point, so branches never observe each other's in-flight
state.

Failures stay local: an unreachable or unknown device is a zero-count leaf and
the traversal carries on past it.
*/

use std::{
    collections::{BTreeSet, HashSet},
    net::IpAddr,
    sync::Arc,
};

use chrono::{Local, NaiveDateTime};
use futures::{
    StreamExt,
    future::{BoxFuture, FutureExt},
    stream,
};
use serde::Deserialize;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{Instrument, debug, info, info_span, warn};

use super::report::{NodeReport, NodeState, PollReport};
use crate::{
    data_aquisition::{core::TransportConnector, directory::Directory},
    drivers::{DeviceDriver, DriverSettings, factory::DriverFactory},
    network::{
        device::{Credentials, DeviceIdentity},
        mac::MacAddress,
    },
    outage::OutageSettings,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TraversalSettings {
    /// Devices polled at the same time across the whole traversal.
    pub fanout: usize,
    /// Deepest level descended into; the root is level 0.
    pub max_depth: usize,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            fanout: 4,
            max_depth: 16,
        }
    }
}

/// Everything a traversal needs, passed in explicitly.
#[derive(Debug, Clone, Default)]
pub struct CensusSettings {
    pub credentials: Credentials,
    pub core_macs: HashSet<MacAddress>,
    pub traversal: TraversalSettings,
    pub drivers: DriverSettings,
    pub outage: OutageSettings,
}

pub struct Census {
    factory: DriverFactory,
    directory: Arc<dyn Directory>,
    credentials: Credentials,
    core_macs: Arc<HashSet<MacAddress>>,
    traversal: TraversalSettings,
    outage: OutageSettings,
}

impl Census {
    pub fn new(connector: Arc<dyn TransportConnector>, directory: Arc<dyn Directory>, settings: CensusSettings) -> Self {
        Self {
            factory: DriverFactory::new(connector, Arc::new(settings.drivers)),
            directory,
            credentials: settings.credentials,
            core_macs: Arc::new(settings.core_macs),
            traversal: settings.traversal,
            outage: settings.outage,
        }
    }

    pub fn factory(&self) -> &DriverFactory {
        &self.factory
    }

    pub fn outage_settings(&self) -> &OutageSettings {
        &self.outage
    }

    pub fn identity(&self, address: IpAddr) -> DeviceIdentity {
        DeviceIdentity::new(address, self.credentials.clone(), Arc::clone(&self.core_macs))
    }

    pub async fn poll(&self, root: IpAddr) -> PollReport {
        self.poll_at(root, Local::now().naive_local()).await
    }

    /// Polls the tree below `root`; `now` anchors the outage window.
    pub async fn poll_at(&self, root: IpAddr, now: NaiveDateTime) -> PollReport {
        let span = info_span!("census", %root);
        let limiter = Semaphore::new(self.traversal.fanout.max(1));
        async move {
            let Some(permit) = acquire(&limiter).await else {
                return self.abandoned(root, now);
            };
            let (tree, outage_detected) = match self.factory.identify(self.identity(root)).await {
                Ok(driver) => {
                    let outage = self.outage_verdict(driver.as_ref(), now).await;
                    (self.resolve(driver, None, Vec::new(), &limiter, permit).await, outage)
                }
                Err(reason) => (
                    NodeReport::leaf(root, None, None, NodeState::Unrecognized(reason.to_string())),
                    None,
                ),
            };
            info!(active_users = tree.total_active, ?outage_detected, "census finished");
            PollReport {
                root,
                polled_at: now,
                active_users: tree.total_active,
                outage_detected,
                tree,
            }
        }
        .instrument(span)
        .await
    }

    fn abandoned(&self, root: IpAddr, now: NaiveDateTime) -> PollReport {
        PollReport {
            root,
            polled_at: now,
            active_users: 0,
            outage_detected: None,
            tree: NodeReport::leaf(root, None, None, NodeState::Unreachable("traversal abandoned".into())),
        }
    }

    /// `Some(verdict)` for drivers with power diagnostics, `None` otherwise or on read failure.
    pub async fn outage_verdict(&self, driver: &dyn DeviceDriver, now: NaiveDateTime) -> Option<bool> {
        let diagnostics = driver.power_diagnostics()?;
        match diagnostics.deregistration_times().await {
            Ok(log) => {
                let buckets = self.outage.correlated_buckets(&log.records, now);
                for (minute, terminals) in &buckets {
                    warn!(address = %driver.address(), %minute, terminals = terminals.len(), "correlated deregistration");
                }
                debug!(address = %driver.address(), records = log.records.len(), rejected = log.rejected, "deregistration log read");
                Some(!buckets.is_empty())
            }
            Err(e) => {
                warn!(address = %driver.address(), error = %e, "could not read deregistration log");
                None
            }
        }
    }

    /// Identifies and descends into one child. `ancestors` is the path from the root, excluding `address`.
    fn visit<'a>(
        &'a self,
        address: IpAddr,
        hostname: String,
        ancestors: Vec<IpAddr>,
        limiter: &'a Semaphore,
    ) -> BoxFuture<'a, NodeReport> {
        async move {
            if ancestors.contains(&address) {
                debug!(%address, %hostname, "already on the path, not descending");
                return NodeReport::leaf(address, Some(hostname), None, NodeState::Revisited);
            }
            if ancestors.len() > self.traversal.max_depth {
                warn!(%address, %hostname, depth = ancestors.len(), "depth limit reached");
                return NodeReport::leaf(address, Some(hostname), None, NodeState::DepthLimit);
            }
            let Some(permit) = acquire(limiter).await else {
                let state = NodeState::Unreachable("traversal abandoned".into());
                return NodeReport::leaf(address, Some(hostname), None, state);
            };
            match self.factory.identify(self.identity(address)).await {
                Ok(driver) => self.resolve(driver, Some(hostname), ancestors, limiter, permit).await,
                Err(reason) => NodeReport::leaf(address, Some(hostname), None, NodeState::Unrecognized(reason.to_string())),
            }
        }
        .boxed()
    }

    /// Counts one identified node and descends. `permit` is released before the children are polled.
    async fn resolve(
        &self,
        driver: Box<dyn DeviceDriver>,
        hostname: Option<String>,
        ancestors: Vec<IpAddr>,
        limiter: &Semaphore,
        permit: SemaphorePermit<'_>,
    ) -> NodeReport {
        let address = driver.address();
        let vendor = driver.vendor();
        let span = info_span!("node", %address, %vendor, depth = ancestors.len());

        async move {
            let own_active = match driver.active_user_count().await {
                Ok(count) => count,
                Err(e) => {
                    warn!(error = %e, "counting failed, branch contributes nothing");
                    return NodeReport::leaf(address, hostname, Some(vendor), NodeState::Unreachable(e.to_string()));
                }
            };
            let neighbors = match driver.neighbors().await {
                Ok(neighbors) => neighbors,
                Err(e) => {
                    warn!(error = %e, "neighbor discovery failed, branch contributes nothing");
                    return NodeReport::leaf(address, hostname, Some(vendor), NodeState::Unreachable(e.to_string()));
                }
            };
            // The session is not needed below this point.
            drop(driver);
            drop(permit);

            for name in &neighbors.manual {
                info!(neighbor = %name, "neighbor left for manual handling");
            }

            let resolved = self.directory.resolve(&neighbors.traversable).await;
            let unresolved: BTreeSet<String> = neighbors
                .traversable
                .iter()
                .filter(|name| !resolved.contains_key(*name))
                .cloned()
                .collect();
            if !unresolved.is_empty() {
                debug!(?unresolved, "neighbors without directory entry dropped");
            }

            let mut path = ancestors;
            path.push(address);
            let children: Vec<NodeReport> = stream::iter(resolved)
                .map(|(name, child)| self.visit(child, name, path.clone(), limiter))
                .buffered(self.traversal.fanout.max(1))
                .collect()
                .await;

            let total_active = own_active + children.iter().map(|child| child.total_active).sum::<u64>();
            debug!(own_active, total_active, children = children.len(), "node resolved");

            NodeReport {
                address,
                hostname,
                vendor: Some(vendor),
                state: NodeState::Resolved,
                own_active,
                total_active,
                manual_neighbors: neighbors.manual,
                unresolved_neighbors: unresolved,
                children,
            }
        }
        .instrument(span)
        .await
    }
}

/// `None` only if the semaphore was closed, which abandons the branch.
async fn acquire(limiter: &Semaphore) -> Option<SemaphorePermit<'_>> {
    limiter.acquire().await.ok()
}
