//! Per-device configuration rendering from an allocation record.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use serde::Serialize;
use tera::{Context, Tera};

use crate::models::{AllocationRecord, NodeAllocation, NodeRole};

const SPINE_TEMPLATE: &str = "spine.tera";
const LEAF_TEMPLATE: &str = "leaf.tera";

const BUILTIN_SPINE: &str = include_str!("templates/spine.tera");
const BUILTIN_LEAF: &str = include_str!("templates/leaf.tera");

/// One underlay BGP session as seen from the rendered node
#[derive(Debug, Serialize)]
struct PeerContext<'a> {
    interface: String,
    local_ip: String,
    peer_ip: String,
    peer_name: &'a str,
    peer_asn: u32,
    peer_loopback: String,
}

#[derive(Debug, Serialize)]
struct ZoneContext<'a> {
    zone_name: &'a str,
    subnet: String,
    prefix_len: u8,
    vlan_id: u16,
    vni: u32,
    gateway: String,
}

pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Load `spine.tera` / `leaf.tera` from `templates_dir` when present,
    /// falling back to the built-in Junos templates per file.
    pub fn new(templates_dir: Option<&Path>) -> Result<Self> {
        let mut tera = Tera::default();
        for (name, builtin) in [(SPINE_TEMPLATE, BUILTIN_SPINE), (LEAF_TEMPLATE, BUILTIN_LEAF)] {
            let content = match templates_dir.map(|dir| dir.join(name)) {
                Some(path) if path.is_file() => {
                    tracing::info!("Using template {}", path.display());
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read template {}", path.display()))?
                }
                _ => builtin.to_string(),
            };
            tera.add_raw_template(name, &content)
                .map_err(|e| anyhow!("Invalid template {}: {}", name, e))?;
        }
        Ok(Self { tera })
    }

    /// Render the configuration text for one node of the record
    pub fn render_node(&self, record: &AllocationRecord, node: &NodeAllocation) -> Result<String> {
        let mut context = Context::new();
        context.insert("hostname", &node.name);
        context.insert("role", node.role.as_str());
        context.insert("loopback", &node.loopback.to_string());
        context.insert("asn", &node.asn);
        context.insert("fabric_asn", &fabric_asn(record));
        context.insert("peers", &peers(record, node)?);

        let zones: Vec<ZoneContext> = match node.role {
            NodeRole::Leaf => record
                .zones()
                .iter()
                .map(|z| ZoneContext {
                    zone_name: &z.zone_name,
                    subnet: z.subnet.to_string(),
                    prefix_len: z.subnet.prefix_len(),
                    vlan_id: z.vlan_id,
                    vni: z.vni,
                    gateway: z.gateway.to_string(),
                })
                .collect(),
            NodeRole::Spine => Vec::new(),
        };
        context.insert("zones", &zones);

        let template = match node.role {
            NodeRole::Spine => SPINE_TEMPLATE,
            NodeRole::Leaf => LEAF_TEMPLATE,
        };
        self.tera
            .render(template, &context)
            .map_err(|e| anyhow!("Template rendering failed for {}: {:?}", node.name, e))
    }

    /// Render every node and write `<name>.conf` files into `out_dir`
    pub fn write_all(&self, record: &AllocationRecord, out_dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;

        let mut written = Vec::with_capacity(record.nodes().len());
        for node in record.nodes() {
            let config = self.render_node(record, node)?;
            let path = out_dir.join(format!("{}.conf", node.name));
            std::fs::write(&path, config)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Generated {} config: {}", node.role, path.display());
            written.push(path);
        }
        Ok(written)
    }
}

/// Route-target ASN shared by the whole fabric: the first spine's ASN
fn fabric_asn(record: &AllocationRecord) -> u32 {
    record
        .nodes_with_role(NodeRole::Spine)
        .map(|n| n.asn)
        .next()
        .unwrap_or_default()
}

fn peers<'a>(record: &'a AllocationRecord, node: &'a NodeAllocation) -> Result<Vec<PeerContext<'a>>> {
    record
        .links_for(&node.name)
        .enumerate()
        .map(|(port, link)| {
            let (local_ip, peer_ip, peer_name) = match node.role {
                NodeRole::Spine => (link.spine_ip, link.leaf_ip, link.leaf_name.as_str()),
                NodeRole::Leaf => (link.leaf_ip, link.spine_ip, link.spine_name.as_str()),
            };
            let peer = record
                .node(peer_name)
                .ok_or_else(|| anyhow!("link {} references unknown node {}", link.label(), peer_name))?;
            Ok(PeerContext {
                interface: format!("et-0/0/{}", port),
                local_ip: local_ip.to_string(),
                peer_ip: peer_ip.to_string(),
                peer_name,
                peer_asn: peer.asn,
                peer_loopback: peer.loopback.to_string(),
            })
        })
        .collect()
}
