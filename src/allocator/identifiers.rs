use crate::models::{ZoneAllocation, ZoneSpec};

use super::error::{AllocationError, AllocationResult};
use super::pool;

/// Highest VLAN id usable on an 802.1Q trunk
pub const MAX_VLAN_ID: u16 = 4094;

/// Highest 24-bit VXLAN network identifier
pub const MAX_VNI: u32 = 0x00FF_FFFF;

/// Assign VLAN, VNI and gateway to every tenant subnet.
///
/// One VLAN counter runs across all zones starting at `vlan_base`, so VLAN
/// ids never repeat inside a record. VNIs are `vni_base + i` with `i` the
/// subnet's position inside its own zone; cross-zone VNI overlap is left to
/// the validator because the bases are caller-controlled.
pub fn allocate_identifiers(
    zones: &[ZoneSpec],
    vlan_base: u16,
) -> AllocationResult<Vec<ZoneAllocation>> {
    if !(1..=MAX_VLAN_ID).contains(&vlan_base) {
        return Err(AllocationError::configuration(
            "fabric.vlan_base",
            format!("{} is outside the VLAN range 1..={}", vlan_base, MAX_VLAN_ID),
        ));
    }

    let total: u64 = zones.iter().map(|z| z.subnets.len() as u64).sum();
    let vlan_room = u64::from(MAX_VLAN_ID - vlan_base) + 1;
    if total > vlan_room {
        return Err(AllocationError::capacity(
            "vlan id",
            format!("{}..={}", vlan_base, MAX_VLAN_ID),
            total,
            vlan_room,
        ));
    }

    let mut next_vlan = vlan_base;
    let mut allocations = Vec::with_capacity(total as usize);

    for zone in zones {
        let vni_room = u64::from(MAX_VNI.saturating_sub(zone.vni_base))
            + u64::from(zone.vni_base <= MAX_VNI);
        if zone.subnets.len() as u64 > vni_room {
            return Err(AllocationError::capacity(
                "vni",
                format!("zone {} ({}..={})", zone.name, zone.vni_base, MAX_VNI),
                zone.subnets.len() as u64,
                vni_room,
            ));
        }

        for (index, subnet) in zone.subnets.iter().enumerate() {
            let gateway = pool::first_usable_host(subnet).ok_or_else(|| {
                AllocationError::SubnetExhaustion {
                    zone: zone.name.clone(),
                    subnet: *subnet,
                }
            })?;

            let allocation = ZoneAllocation {
                zone_name: zone.name.clone(),
                subnet: *subnet,
                vlan_id: next_vlan,
                // bounded by the vni_room check above
                vni: zone.vni_base + index as u32,
                gateway,
            };
            tracing::debug!(
                "zone {} subnet {} vlan={} vni={} gateway={}",
                allocation.zone_name,
                allocation.subnet,
                allocation.vlan_id,
                allocation.vni,
                allocation.gateway
            );
            allocations.push(allocation);
            next_vlan = next_vlan.saturating_add(1);
        }
    }

    Ok(allocations)
}
