//! Parsers for the Junos CLI text the health probe collects.
//!
//! Only the columns the report needs are extracted; unknown lines are skipped.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::models::{BgpNeighbor, EvpnInstance, InterfaceStatus, VtepEntry};

fn physical_interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^((?:et|xe|ge)-\d+/\d+/\d+(?::\d+)?)\s+(\S+)\s+(\S+)").expect("static regex")
    })
}

fn mac_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:[0-9a-f]{2}:){5}[0-9a-f]{2}\b").expect("static regex"))
}

/// Peer rows of `show bgp summary`
pub fn bgp_neighbors(output: &str) -> Vec<BgpNeighbor> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            let address = tokens.next()?;
            address.parse::<Ipv4Addr>().ok()?;
            let last = tokens.last()?;
            // Established peers may print per-table counts instead of a state word
            let state = if line.contains("Establ") || last.contains('/') {
                "Establ"
            } else {
                last
            };
            Some(BgpNeighbor {
                address: address.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// Physical fabric ports (et-/xe-/ge-) of `show interfaces terse`
pub fn physical_interfaces(output: &str) -> Vec<InterfaceStatus> {
    output
        .lines()
        .filter_map(|line| {
            let caps = physical_interface_re().captures(line)?;
            Some(InterfaceStatus {
                name: caps[1].to_string(),
                admin: caps[2].to_string(),
                oper: caps[3].to_string(),
            })
        })
        .collect()
}

/// Instances of `show evpn database` with the number of MAC rows under each
pub fn evpn_instances(output: &str) -> Vec<EvpnInstance> {
    let mut instances: Vec<EvpnInstance> = Vec::new();
    for line in output.lines() {
        if let Some(name) = line.trim().strip_prefix("Instance:") {
            instances.push(EvpnInstance {
                instance: name.trim().to_string(),
                mac_count: 0,
            });
        } else if mac_re().is_match(line) {
            if let Some(current) = instances.last_mut() {
                current.mac_count += 1;
            }
        }
    }
    instances
}

/// Remote VTEP / VNI pairs of `show ethernet-switching vxlan-tunnel-end-point remote`
pub fn remote_vteps(output: &str) -> Vec<VtepEntry> {
    enum Section {
        Other,
        Remote,
        Vni,
    }

    let mut section = Section::Other;
    let mut remote: Option<String> = None;
    let mut entries = Vec::new();

    for line in output.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("RVTEP-IP") {
            section = Section::Remote;
            continue;
        }
        if trimmed.starts_with("VNID") {
            section = Section::Vni;
            continue;
        }
        let Some(first) = trimmed.split_whitespace().next() else {
            continue;
        };
        match section {
            Section::Remote => {
                if first.parse::<Ipv4Addr>().is_ok() {
                    remote = Some(first.to_string());
                }
            }
            Section::Vni => {
                if let (Some(ip), true) = (&remote, first.chars().all(|c| c.is_ascii_digit())) {
                    entries.push(VtepEntry {
                        remote_ip: ip.clone(),
                        vni: first.to_string(),
                    });
                }
            }
            Section::Other => {}
        }
    }
    entries
}
