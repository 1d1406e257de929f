use crate::models::{FabricSpec, LinkAllocation, NodeAllocation, NodeRole, DEFAULT_LEAF_ASN_OFFSET};

use super::error::{AllocationError, AllocationResult};
use super::pool;

/// Allocate loopbacks, ASNs and spine-leaf link blocks for every node.
///
/// Nodes come back spines first, then leafs, each in index order. Links are
/// spine-major: every leaf of spine1, then every leaf of spine2, and so on.
pub fn allocate_addresses(
    spec: &FabricSpec,
) -> AllocationResult<(Vec<NodeAllocation>, Vec<LinkAllocation>)> {
    if spec.spine_count == 0 {
        return Err(AllocationError::configuration("spines.count", "must be at least 1"));
    }
    if spec.leaf_count == 0 {
        return Err(AllocationError::configuration("leafs.count", "must be at least 1"));
    }

    let nodes = allocate_nodes(spec)?;
    let links = allocate_links(spec, &nodes)?;
    Ok((nodes, links))
}

/// Resolve the leaf ASN offset, rejecting any value that lands inside the spine range
pub fn resolve_leaf_offset(spec: &FabricSpec) -> AllocationResult<u32> {
    let highest_spine = spec.spine_count.saturating_sub(1);
    match spec.leaf_asn_offset {
        Some(offset) if offset <= highest_spine => Err(AllocationError::configuration(
            "fabric.leaf_asn_offset",
            format!(
                "offset {} collides with spine ASNs {}..={}; it must be greater than {}",
                offset,
                spec.asn_base,
                u64::from(spec.asn_base) + u64::from(highest_spine),
                highest_spine
            ),
        )),
        Some(offset) => Ok(offset),
        None if DEFAULT_LEAF_ASN_OFFSET > highest_spine => Ok(DEFAULT_LEAF_ASN_OFFSET),
        None => Ok(spec.spine_count),
    }
}

fn allocate_nodes(spec: &FabricSpec) -> AllocationResult<Vec<NodeAllocation>> {
    let required = u64::from(spec.spine_count) + u64::from(spec.leaf_count);
    let available = pool::host_count(&spec.loopback_pool);
    let exhausted =
        || AllocationError::capacity("loopback", spec.loopback_pool.to_string(), required, available);
    if available < required {
        return Err(exhausted());
    }

    let leaf_offset = resolve_leaf_offset(spec)?;
    let mut hosts = spec.loopback_pool.hosts();
    let mut nodes = Vec::with_capacity(required as usize);

    let plan = [
        (NodeRole::Spine, spec.spine_count, 0),
        (NodeRole::Leaf, spec.leaf_count, leaf_offset),
    ];
    for (role, count, offset) in plan {
        for index in 0..count {
            let loopback = hosts.next().ok_or_else(exhausted)?;
            let asn = spec
                .asn_base
                .checked_add(offset)
                .and_then(|asn| asn.checked_add(index))
                .ok_or_else(|| {
                    AllocationError::configuration(
                        "fabric.asn",
                        format!(
                            "ASN for {} overflows 32 bits (base {}, offset {}, index {})",
                            role.node_name(index),
                            spec.asn_base,
                            offset,
                            index
                        ),
                    )
                })?;
            let node = NodeAllocation {
                name: role.node_name(index),
                role,
                loopback,
                asn,
            };
            tracing::debug!("{} loopback={} asn={}", node.name, node.loopback, node.asn);
            nodes.push(node);
        }
    }

    Ok(nodes)
}

fn allocate_links(
    spec: &FabricSpec,
    nodes: &[NodeAllocation],
) -> AllocationResult<Vec<LinkAllocation>> {
    let required = u64::from(spec.spine_count) * u64::from(spec.leaf_count);
    let available = pool::block_count(&spec.link_pool);
    let exhausted =
        || AllocationError::capacity("link block", spec.link_pool.to_string(), required, available);
    if available < required {
        return Err(exhausted());
    }

    let mut blocks = spec
        .link_pool
        .subnets(pool::LINK_BLOCK_PREFIX)
        .map_err(|_| exhausted())?;

    let spines = nodes.iter().filter(|n| n.role == NodeRole::Spine);
    let leafs: Vec<&NodeAllocation> = nodes.iter().filter(|n| n.role == NodeRole::Leaf).collect();

    let mut links = Vec::with_capacity(required as usize);
    for spine in spines {
        for leaf in &leafs {
            let block = blocks.next().ok_or_else(exhausted)?;
            // A /31 holds exactly two addresses: the lower one faces the spine
            let link = LinkAllocation {
                spine_name: spine.name.clone(),
                leaf_name: leaf.name.clone(),
                spine_ip: block.network(),
                leaf_ip: block.broadcast(),
            };
            tracing::debug!("{} block={}", link.label(), block);
            links.push(link);
        }
    }

    Ok(links)
}
