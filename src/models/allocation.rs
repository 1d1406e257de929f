use std::fmt;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Serialize;

/// Topology role of a fabric node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    Spine,
    Leaf,
}

impl NodeRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Spine => "spine",
            NodeRole::Leaf => "leaf",
        }
    }

    /// Node name for the 0-based index within this role, e.g. `spine1`
    pub fn node_name(&self, index: u32) -> String {
        format!("{}{}", self.as_str(), u64::from(index) + 1)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlay identity of one spine or leaf
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeAllocation {
    pub name: String,
    pub role: NodeRole,
    pub loopback: Ipv4Addr,
    pub asn: u32,
}

/// Point-to-point link between a spine and a leaf, one /31 per pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkAllocation {
    pub spine_name: String,
    pub leaf_name: String,
    pub spine_ip: Ipv4Addr,
    pub leaf_ip: Ipv4Addr,
}

impl LinkAllocation {
    /// Human-readable link label, e.g. `spine1-leaf2`
    pub fn label(&self) -> String {
        format!("{}-{}", self.spine_name, self.leaf_name)
    }
}

/// Overlay identifiers for one tenant subnet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneAllocation {
    pub zone_name: String,
    pub subnet: Ipv4Net,
    pub vlan_id: u16,
    pub vni: u32,
    pub gateway: Ipv4Addr,
}

/// AllocationRecord is the validated output of one allocation run.
///
/// Only the validator constructs it, so holding one means every fabric
/// invariant has been checked. Read-only after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationRecord {
    nodes: Vec<NodeAllocation>,
    links: Vec<LinkAllocation>,
    zones: Vec<ZoneAllocation>,
}

impl AllocationRecord {
    pub(crate) fn new(
        nodes: Vec<NodeAllocation>,
        links: Vec<LinkAllocation>,
        zones: Vec<ZoneAllocation>,
    ) -> Self {
        Self {
            nodes,
            links,
            zones,
        }
    }

    pub fn nodes(&self) -> &[NodeAllocation] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkAllocation] {
        &self.links
    }

    pub fn zones(&self) -> &[ZoneAllocation] {
        &self.zones
    }

    pub fn nodes_with_role(&self, role: NodeRole) -> impl Iterator<Item = &NodeAllocation> {
        self.nodes.iter().filter(move |n| n.role == role)
    }

    pub fn node(&self, name: &str) -> Option<&NodeAllocation> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Links terminating on the named node, in allocation order
    pub fn links_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a LinkAllocation> {
        self.links
            .iter()
            .filter(move |l| l.spine_name == name || l.leaf_name == name)
    }

    /// Pretty JSON form used for dry runs and allocation diffs
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
