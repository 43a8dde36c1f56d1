use std::{collections::BTreeSet, net::IpAddr};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::drivers::Vendor;

/// Final state of one node of the traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum NodeState {
    /// Counted and its children enumerated.
    Resolved,
    /// Identification failed or matched no driver.
    Unrecognized(String),
    /// Identified, but a later exchange failed; contributes nothing.
    Unreachable(String),
    /// Already on the path from the root; not descended again.
    Revisited,
    DepthLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub address: IpAddr,
    /// Directory name the parent knew this node by; `None` for the root.
    pub hostname: Option<String>,
    pub vendor: Option<Vendor>,
    #[serde(flatten)]
    pub state: NodeState,
    /// Active subscribers on this device alone.
    pub own_active: u64,
    /// `own_active` plus every descendant's total.
    pub total_active: u64,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub manual_neighbors: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub unresolved_neighbors: BTreeSet<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeReport>,
}

impl NodeReport {
    /// A zero-count node with nothing below it.
    pub fn leaf(address: IpAddr, hostname: Option<String>, vendor: Option<Vendor>, state: NodeState) -> Self {
        Self {
            address,
            hostname,
            vendor,
            state,
            own_active: 0,
            total_active: 0,
            manual_neighbors: BTreeSet::new(),
            unresolved_neighbors: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    /// Depth-first iterator over this node and all descendants.
    pub fn iter(&self) -> impl Iterator<Item = &NodeReport> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Manual-handling neighbors collected across the whole subtree.
    pub fn all_manual_neighbors(&self) -> BTreeSet<String> {
        self.iter().flat_map(|node| node.manual_neighbors.iter().cloned()).collect()
    }
}

/// What the ticketing side consumes for one polled root.
#[derive(Debug, Clone, Serialize)]
pub struct PollReport {
    pub root: IpAddr,
    pub polled_at: NaiveDateTime,
    pub active_users: u64,
    /// `None` when the root has no power diagnostics or they could not be read.
    pub outage_detected: Option<bool>,
    pub tree: NodeReport,
}
