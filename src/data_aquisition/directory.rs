/*!
Host name to address resolution.

Neighbor identifiers read from port descriptions are inventory host names; the
traversal engine needs addresses. This module defines the `Directory` seam and
a static, config-backed implementation of it.
*/

use std::{
    collections::{BTreeMap, BTreeSet},
    net::IpAddr,
};

use async_trait::async_trait;
use indexmap::IndexMap;
use tracing::debug;

/// Resolves inventory host names to management addresses.
///
/// Names without a known mapping are left out of the result; that is not an error.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn resolve(&self, hostnames: &BTreeSet<String>) -> IndexMap<String, IpAddr>;
}

/// Fixed host table, typically loaded from the `[directory.hosts]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    hosts: BTreeMap<String, IpAddr>,
}

impl StaticDirectory {
    pub fn new(hosts: BTreeMap<String, IpAddr>) -> Self {
        Self { hosts }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn resolve(&self, hostnames: &BTreeSet<String>) -> IndexMap<String, IpAddr> {
        let mut out = IndexMap::with_capacity(hostnames.len());
        for name in hostnames {
            match self.hosts.get(name.trim()) {
                Some(address) => {
                    out.insert(name.clone(), *address);
                }
                None => debug!(hostname = %name, "no directory entry"),
            }
        }
        out
    }
}
