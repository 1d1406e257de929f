//! Human-readable summaries of allocation records and health runs.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};

use crate::models::{AllocationRecord, DeviceOutcome, HealthReport, NodeRole};

fn node_table(record: &AllocationRecord, role: NodeRole) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Name", "Loopback", "ASN"]);
    for node in record.nodes_with_role(role) {
        table.add_row(vec![
            Cell::new(&node.name),
            Cell::new(node.loopback),
            Cell::new(node.asn),
        ]);
    }
    table
}

/// Spine, leaf, link and zone tables for an allocation record
pub fn summary_tables(record: &AllocationRecord) -> String {
    let mut links = Table::new();
    links.set_header(vec!["Link", "Spine IP", "Leaf IP"]);
    for link in record.links() {
        links.add_row(vec![
            Cell::new(link.label()),
            Cell::new(link.spine_ip),
            Cell::new(link.leaf_ip),
        ]);
    }

    let mut zones = Table::new();
    zones.set_header(vec!["Zone", "Subnet", "VLAN", "VNI", "Gateway"]);
    for zone in record.zones() {
        zones.add_row(vec![
            Cell::new(&zone.zone_name),
            Cell::new(zone.subnet),
            Cell::new(zone.vlan_id),
            Cell::new(zone.vni),
            Cell::new(zone.gateway),
        ]);
    }

    format!(
        "Spine Switches\n{}\n\nLeaf Switches\n{}\n\nFabric Links\n{}\n\nTenant Zones\n{}\n",
        node_table(record, NodeRole::Spine),
        node_table(record, NodeRole::Leaf),
        links,
        zones
    )
}

/// One row per device: counters for reachable devices, the error otherwise
pub fn health_table(report: &HealthReport) -> String {
    let mut table = Table::new();
    table.set_header(vec!["Device", "BGP Up", "EVPN", "MACs", "VTEPs", "Interfaces Up", "Status"]);
    for device in &report.devices {
        let row = match &device.outcome {
            DeviceOutcome::Checked(health) => vec![
                Cell::new(&device.host),
                Cell::new(format!("{}/{}", health.bgp_up(), health.bgp.len())),
                Cell::new(health.evpn.len()),
                Cell::new(health.total_macs()),
                Cell::new(health.vteps.len()),
                Cell::new(format!("{}/{}", health.interfaces_up(), health.interfaces.len())),
                Cell::new(if health.all_bgp_up() { "OK" } else { "BGP DOWN" }),
            ],
            DeviceOutcome::Failed { error } => vec![
                Cell::new(&device.host),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new("-"),
                Cell::new(format!("FAILED: {}", error)),
            ],
        };
        table.add_row(row);
    }
    table.to_string()
}

/// Plain-text validation report written after a health run
pub fn health_report(report: &HealthReport, timestamp: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "EVPN/VXLAN Fabric Validation Report");
    let _ = writeln!(out, "{}", "=".repeat(50));
    let _ = writeln!(out, "Timestamp: {}", timestamp.format("%Y-%m-%d %H:%M:%S"));

    for device in &report.devices {
        let _ = writeln!(out, "\nDevice: {}", device.host);
        let _ = writeln!(out, "{}", "-".repeat(30));
        match &device.outcome {
            DeviceOutcome::Checked(health) => {
                let _ = writeln!(out, "BGP Neighbors: {}/{} UP", health.bgp_up(), health.bgp.len());
                let _ = writeln!(
                    out,
                    "EVPN Instances: {}, Total MACs: {}",
                    health.evpn.len(),
                    health.total_macs()
                );
                let _ = writeln!(out, "VXLAN VTEPs: {}", health.vteps.len());
                let _ = writeln!(
                    out,
                    "Interfaces: {}/{} UP",
                    health.interfaces_up(),
                    health.interfaces.len()
                );
            }
            DeviceOutcome::Failed { error } => {
                let _ = writeln!(out, "Check failed: {}", error);
            }
        }
    }

    let _ = writeln!(out, "\nDevices validated: {}", report.checked().count());
    let _ = writeln!(out, "Devices failed: {}", report.failed().count());
    let verdict = if report.is_healthy() { "GOOD" } else { "ISSUES DETECTED" };
    let _ = writeln!(out, "Fabric health: {}", verdict);
    out
}
