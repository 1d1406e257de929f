//! Fabric address and identifier allocation.
//!
//! `allocate` runs the whole pipeline: underlay addresses, overlay
//! identifiers, then global validation. Each stage is terminal on its first
//! error and no record escapes unless every stage succeeds.

mod addresses;
mod error;
mod identifiers;
mod pool;
mod validator;

pub use addresses::{allocate_addresses, resolve_leaf_offset};
pub use error::{AllocationError, AllocationResult};
pub use identifiers::{allocate_identifiers, MAX_VLAN_ID, MAX_VNI};
pub use validator::validate;

use crate::models::{AllocationRecord, FabricSpec};

/// Compute the full allocation record for a fabric spec
pub fn allocate(spec: &FabricSpec) -> AllocationResult<AllocationRecord> {
    tracing::info!(
        "Allocating fabric: {} spines, {} leafs, {} zones ({} subnets)",
        spec.spine_count,
        spec.leaf_count,
        spec.zones.len(),
        spec.subnet_count()
    );

    let (nodes, links) = allocate_addresses(spec)?;
    tracing::info!(
        "Underlay: {} loopbacks from {}, {} link blocks from {}",
        nodes.len(),
        spec.loopback_pool,
        links.len(),
        spec.link_pool
    );

    let zones = allocate_identifiers(&spec.zones, spec.vlan_base)?;
    tracing::info!("Overlay: {} VLAN/VNI assignments", zones.len());

    let record = validate(spec, nodes, links, zones)?;
    tracing::info!("Allocation validated");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeRole, ZoneSpec};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn zone(name: &str, vni_base: u32, subnets: &[&str]) -> ZoneSpec {
        ZoneSpec {
            name: name.to_string(),
            vni_base,
            subnets: subnets.iter().map(|s| s.parse().unwrap()).collect(),
        }
    }

    fn spec(spines: u32, leafs: u32, zones: Vec<ZoneSpec>) -> FabricSpec {
        FabricSpec {
            asn_base: 65000,
            loopback_pool: "10.255.0.0/24".parse().unwrap(),
            link_pool: "10.1.0.0/24".parse().unwrap(),
            spine_count: spines,
            leaf_count: leafs,
            leaf_asn_offset: None,
            vlan_base: 100,
            zones,
        }
    }

    #[test]
    fn test_two_by_two_fabric() {
        let record = allocate(&spec(2, 2, vec![])).unwrap();
        assert_eq!(record.links().len(), 4);
        let blocks: HashSet<_> = record
            .links()
            .iter()
            .map(|l| (l.spine_ip, l.leaf_ip))
            .collect();
        assert_eq!(blocks.len(), 4);
        let spines: Vec<&str> = record
            .nodes_with_role(NodeRole::Spine)
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(spines, vec!["spine1", "spine2"]);
        assert_eq!(record.links_for("leaf2").count(), 2);
    }

    #[test]
    fn test_blue_zone() {
        let record = allocate(&spec(
            1,
            1,
            vec![zone("blue", 5000, &["10.0.1.0/24", "10.0.2.0/24"])],
        ))
        .unwrap();
        let ids: Vec<(u32, String)> = record
            .zones()
            .iter()
            .map(|z| (z.vni, z.gateway.to_string()))
            .collect();
        assert_eq!(
            ids,
            vec![(5000, "10.0.1.1".to_string()), (5001, "10.0.2.1".to_string())]
        );
    }

    #[test]
    fn test_two_zones_get_distinct_vlans() {
        let record = allocate(&spec(
            1,
            1,
            vec![
                zone("blue", 5000, &["10.0.1.0/24"]),
                zone("red", 6000, &["10.0.2.0/24"]),
            ],
        ))
        .unwrap();
        let vlans: Vec<u16> = record.zones().iter().map(|z| z.vlan_id).collect();
        assert_eq!(vlans, vec![100, 101]);
    }

    #[test]
    fn test_small_loopback_pool_fails_without_record() {
        let mut s = spec(2, 2, vec![]);
        s.loopback_pool = "10.255.0.0/30".parse().unwrap();
        assert!(matches!(
            allocate(&s),
            Err(AllocationError::CapacityExceeded { resource: "loopback", .. })
        ));
    }

    #[test]
    fn test_overlapping_vni_ranges_name_both_zones() {
        let s = spec(
            1,
            1,
            vec![
                zone("A", 5000, &["10.0.1.0/24", "10.0.2.0/24", "10.0.3.0/24"]),
                zone("B", 5002, &["10.0.4.0/24"]),
            ],
        );
        match allocate(&s) {
            Err(AllocationError::Collision {
                resource,
                value,
                first,
                second,
            }) => {
                assert_eq!(resource, "vni");
                assert_eq!(value, "5002");
                assert_eq!(first, "zone A subnet 2");
                assert_eq!(second, "zone B subnet 0");
            }
            other => panic!("expected vni collision, got {:?}", other),
        }
    }

    #[test]
    fn test_zone_subnet_in_underlay_pool_rejected() {
        for (subnet, pool) in [
            ("10.255.0.0/24", "underlay loopback pool 10.255.0.0/24"),
            ("10.1.0.0/25", "underlay link pool 10.1.0.0/24"),
        ] {
            let s = spec(1, 2, vec![zone("blue", 5000, &[subnet])]);
            match allocate(&s) {
                Err(AllocationError::Collision { resource, second, .. }) => {
                    assert_eq!(resource, "subnet");
                    assert_eq!(second, pool);
                }
                other => panic!("expected subnet collision for {}, got {:?}", subnet, other),
            }
        }
    }

    #[test]
    fn test_allocation_is_byte_identical_across_runs() {
        let s = spec(
            3,
            5,
            vec![
                zone("blue", 5000, &["10.0.1.0/24", "10.0.2.0/24"]),
                zone("red", 6000, &["10.0.3.0/24"]),
            ],
        );
        let first = allocate(&s).unwrap().to_json().unwrap();
        let second = allocate(&s).unwrap().to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_record_json_shape() {
        let record = allocate(&spec(1, 1, vec![zone("blue", 5000, &["10.0.1.0/24"])])).unwrap();
        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(
            json["nodes"][0],
            serde_json::json!({"name": "spine1", "role": "spine", "loopback": "10.255.0.1", "asn": 65000})
        );
        assert_eq!(
            json["links"][0],
            serde_json::json!({"spine_name": "spine1", "leaf_name": "leaf1", "spine_ip": "10.1.0.0", "leaf_ip": "10.1.0.1"})
        );
        assert_eq!(
            json["zones"][0],
            serde_json::json!({"zone_name": "blue", "subnet": "10.0.1.0/24", "vlan_id": 100, "vni": 5000, "gateway": "10.0.1.1"})
        );
    }

    proptest! {
        #[test]
        fn prop_underlay_invariants_hold(spines in 1u32..8, leafs in 1u32..40, asn in 64512u32..65000) {
            let mut s = spec(spines, leafs, vec![]);
            s.asn_base = asn;
            s.link_pool = "10.1.0.0/20".parse().unwrap();
            let record = allocate(&s).unwrap();

            let loopbacks: HashSet<_> = record.nodes().iter().map(|n| n.loopback).collect();
            prop_assert_eq!(loopbacks.len(), record.nodes().len());
            prop_assert!(record.nodes().iter().all(|n| s.loopback_pool.contains(&n.loopback)));

            let asns: HashSet<_> = record.nodes().iter().map(|n| n.asn).collect();
            prop_assert_eq!(asns.len(), record.nodes().len());

            prop_assert_eq!(record.links().len() as u32, spines * leafs);
            let endpoints: HashSet<_> = record
                .links()
                .iter()
                .flat_map(|l| [l.spine_ip, l.leaf_ip])
                .collect();
            prop_assert_eq!(endpoints.len(), record.links().len() * 2);
            prop_assert!(endpoints.iter().all(|ip| s.link_pool.contains(ip)));
        }

        #[test]
        fn prop_overlay_identifiers_unique(subnets_per_zone in proptest::collection::vec(1usize..6, 1..6)) {
            let zones: Vec<ZoneSpec> = subnets_per_zone
                .iter()
                .enumerate()
                .map(|(z, count)| ZoneSpec {
                    name: format!("zone{}", z),
                    vni_base: 10_000 * (z as u32 + 1),
                    subnets: (0..*count)
                        .map(|i| format!("10.{}.{}.0/24", 100 + z, i).parse().unwrap())
                        .collect(),
                })
                .collect();
            let record = allocate(&spec(2, 2, zones)).unwrap();

            let vlans: HashSet<_> = record.zones().iter().map(|z| z.vlan_id).collect();
            let vnis: HashSet<_> = record.zones().iter().map(|z| z.vni).collect();
            prop_assert_eq!(vlans.len(), record.zones().len());
            prop_assert_eq!(vnis.len(), record.zones().len());
            prop_assert!(record.zones().iter().all(|z| z.subnet.contains(&z.gateway)));
        }
    }
}
