//! Global invariant checks over the combined allocator output.
//!
//! Everything here is re-derived from the fabric pools and the allocations
//! themselves; nothing relies on how the allocators produced their values.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::models::{
    AllocationRecord, FabricSpec, LinkAllocation, NodeAllocation, NodeRole, ZoneAllocation,
};

use super::error::{AllocationError, AllocationResult};
use super::identifiers::{MAX_VLAN_ID, MAX_VNI};
use super::pool;

/// Check every fabric invariant and seal the allocations into a record.
///
/// Fails on the first violation; no record is produced in that case.
pub fn validate(
    spec: &FabricSpec,
    nodes: Vec<NodeAllocation>,
    links: Vec<LinkAllocation>,
    zones: Vec<ZoneAllocation>,
) -> AllocationResult<AllocationRecord> {
    check_pool_capacity(spec)?;
    check_topology(spec, &nodes, &links)?;
    check_nodes(spec, &nodes)?;
    check_links(spec, &links)?;
    check_underlay_reuse(&nodes, &links)?;
    check_zones(spec, &zones)?;

    tracing::debug!(
        "Validated {} nodes, {} links, {} zone subnets",
        nodes.len(),
        links.len(),
        zones.len()
    );
    Ok(AllocationRecord::new(nodes, links, zones))
}

/// Reject the first key seen twice, naming both owners
fn ensure_unique<K, I>(resource: &'static str, entries: I) -> AllocationResult<()>
where
    K: Ord + Display,
    I: IntoIterator<Item = (K, String)>,
{
    let mut seen: BTreeMap<K, String> = BTreeMap::new();
    for (key, owner) in entries {
        match seen.entry(key) {
            Entry::Occupied(first) => {
                return Err(AllocationError::Collision {
                    resource,
                    value: first.key().to_string(),
                    first: first.get().clone(),
                    second: owner,
                });
            }
            Entry::Vacant(slot) => {
                slot.insert(owner);
            }
        }
    }
    Ok(())
}

fn check_pool_capacity(spec: &FabricSpec) -> AllocationResult<()> {
    let nodes = u64::from(spec.spine_count) + u64::from(spec.leaf_count);
    let hosts = pool::host_count(&spec.loopback_pool);
    if hosts < nodes {
        return Err(AllocationError::capacity(
            "loopback",
            spec.loopback_pool.to_string(),
            nodes,
            hosts,
        ));
    }

    let pairs = u64::from(spec.spine_count) * u64::from(spec.leaf_count);
    let blocks = pool::block_count(&spec.link_pool);
    if blocks < pairs {
        return Err(AllocationError::capacity(
            "link block",
            spec.link_pool.to_string(),
            pairs,
            blocks,
        ));
    }
    Ok(())
}

/// Nodes must be exactly spine1..spineN then leaf1..leafM, and every link
/// must join an existing spine to an existing leaf, one link per pair.
fn check_topology(
    spec: &FabricSpec,
    nodes: &[NodeAllocation],
    links: &[LinkAllocation],
) -> AllocationResult<()> {
    let expected: Vec<(NodeRole, String)> = [
        (NodeRole::Spine, spec.spine_count),
        (NodeRole::Leaf, spec.leaf_count),
    ]
    .into_iter()
    .flat_map(|(role, count)| (0..count).map(move |i| (role, role.node_name(i))))
    .collect();

    if nodes.len() != expected.len() {
        return Err(AllocationError::configuration(
            "nodes",
            format!(
                "expected {} nodes ({} spines + {} leafs), got {}",
                expected.len(),
                spec.spine_count,
                spec.leaf_count,
                nodes.len()
            ),
        ));
    }
    for (index, (node, (role, name))) in nodes.iter().zip(&expected).enumerate() {
        if node.role != *role || node.name != *name {
            return Err(AllocationError::configuration(
                format!("nodes[{}]", index),
                format!("expected {} {}, got {} {}", role, name, node.role, node.name),
            ));
        }
    }

    let pairs = u64::from(spec.spine_count) * u64::from(spec.leaf_count);
    if links.len() as u64 != pairs {
        return Err(AllocationError::configuration(
            "links",
            format!(
                "expected {} links ({} spines x {} leafs), got {}",
                pairs,
                spec.spine_count,
                spec.leaf_count,
                links.len()
            ),
        ));
    }

    let roles: HashMap<&str, NodeRole> = nodes.iter().map(|n| (n.name.as_str(), n.role)).collect();
    for link in links {
        for (name, role) in [(&link.spine_name, NodeRole::Spine), (&link.leaf_name, NodeRole::Leaf)] {
            if roles.get(name.as_str()) != Some(&role) {
                return Err(AllocationError::configuration(
                    format!("link {}", link.label()),
                    format!("{} is not a {} of this fabric", name, role),
                ));
            }
        }
    }

    // With the count fixed and every endpoint valid, unique pairs cover the full mesh
    ensure_unique(
        "link",
        links
            .iter()
            .enumerate()
            .map(|(i, l)| (l.label(), format!("links[{}]", i))),
    )
}

fn check_nodes(spec: &FabricSpec, nodes: &[NodeAllocation]) -> AllocationResult<()> {
    ensure_unique("node name", nodes.iter().map(|n| (n.name.clone(), n.name.clone())))?;

    for node in nodes {
        if !pool::is_host_of(&spec.loopback_pool, node.loopback) {
            return Err(AllocationError::configuration(
                format!("{}.loopback", node.name),
                format!(
                    "{} is not a host address of loopback pool {}",
                    node.loopback, spec.loopback_pool
                ),
            ));
        }
    }

    ensure_unique("loopback", nodes.iter().map(|n| (n.loopback, n.name.clone())))?;
    ensure_unique("asn", nodes.iter().map(|n| (n.asn, n.name.clone())))
}

fn check_links(spec: &FabricSpec, links: &[LinkAllocation]) -> AllocationResult<()> {
    for link in links {
        let block = pool::block_of(link.spine_ip);
        let paired = link.spine_ip != link.leaf_ip && block.contains(&link.leaf_ip);
        if !paired {
            return Err(AllocationError::configuration(
                format!("link {}", link.label()),
                format!(
                    "{} and {} do not form a two-address block",
                    link.spine_ip, link.leaf_ip
                ),
            ));
        }
        if !spec.link_pool.contains(&block) {
            return Err(AllocationError::configuration(
                format!("link {}", link.label()),
                format!("block {} lies outside link pool {}", block, spec.link_pool),
            ));
        }
    }

    ensure_unique(
        "link block",
        links
            .iter()
            .map(|l| (pool::block_of(l.spine_ip), format!("link {}", l.label()))),
    )
}

fn check_underlay_reuse(nodes: &[NodeAllocation], links: &[LinkAllocation]) -> AllocationResult<()> {
    let loopbacks = nodes
        .iter()
        .map(|n| (n.loopback, format!("{} loopback", n.name)));
    let endpoints = links.iter().flat_map(|l| {
        [
            (l.spine_ip, format!("link {} ({} side)", l.label(), l.spine_name)),
            (l.leaf_ip, format!("link {} ({} side)", l.label(), l.leaf_name)),
        ]
    });
    ensure_unique::<Ipv4Addr, _>("underlay address", loopbacks.chain(endpoints))
}

fn check_zones(spec: &FabricSpec, zones: &[ZoneAllocation]) -> AllocationResult<()> {
    // Owner labels use the subnet's position inside its own zone
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let labels: Vec<String> = zones
        .iter()
        .map(|z| {
            let position = positions.entry(z.zone_name.as_str()).or_insert(0);
            let label = format!("zone {} subnet {}", z.zone_name, position);
            *position += 1;
            label
        })
        .collect();

    for (zone, label) in zones.iter().zip(&labels) {
        if !pool::is_usable_host(&zone.subnet, zone.gateway) {
            return Err(AllocationError::configuration(
                format!("{} gateway", label),
                format!("{} is not a usable host of {}", zone.gateway, zone.subnet),
            ));
        }
        if !(1..=MAX_VLAN_ID).contains(&zone.vlan_id) {
            return Err(AllocationError::capacity(
                "vlan id",
                format!("1..={}", MAX_VLAN_ID),
                u64::from(zone.vlan_id),
                u64::from(MAX_VLAN_ID),
            ));
        }
        if zone.vni > MAX_VNI {
            return Err(AllocationError::capacity(
                "vni",
                format!("0..={}", MAX_VNI),
                u64::from(zone.vni),
                u64::from(MAX_VNI),
            ));
        }
    }

    let underlay = [
        ("loopback pool", spec.loopback_pool),
        ("link pool", spec.link_pool),
    ];
    for (zone, label) in zones.iter().zip(&labels) {
        for (pool_name, pool_net) in &underlay {
            if pool::overlaps(&zone.subnet, pool_net) {
                return Err(AllocationError::Collision {
                    resource: "subnet",
                    value: narrower(zone.subnet, *pool_net).to_string(),
                    first: format!("{} ({})", label, zone.subnet),
                    second: format!("underlay {} {}", pool_name, pool_net),
                });
            }
        }
    }

    for (i, a) in zones.iter().enumerate() {
        for (j, b) in zones.iter().enumerate().skip(i + 1) {
            if pool::overlaps(&a.subnet, &b.subnet) {
                return Err(AllocationError::Collision {
                    resource: "subnet",
                    value: narrower(a.subnet, b.subnet).to_string(),
                    first: format!("{} ({})", labels[i], a.subnet),
                    second: format!("{} ({})", labels[j], b.subnet),
                });
            }
        }
    }

    let owners = || zones.iter().zip(labels.iter().cloned());
    ensure_unique("vlan", owners().map(|(z, label)| (z.vlan_id, label)))?;
    ensure_unique("vni", owners().map(|(z, label)| (z.vni, label)))
}

fn narrower(a: Ipv4Net, b: Ipv4Net) -> Ipv4Net {
    if a.prefix_len() >= b.prefix_len() {
        a
    } else {
        b
    }
}
