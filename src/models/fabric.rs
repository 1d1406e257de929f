use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::allocator::{AllocationError, AllocationResult};

/// First VLAN id handed to tenant subnets when the input leaves it unset
pub const DEFAULT_VLAN_BASE: u16 = 100;

/// Leaf ASN offset used when the input leaves it unset and it clears the spine range
pub const DEFAULT_LEAF_ASN_OFFSET: u32 = 100;

/// FabricSpec is the parsed, immutable description of one Clos fabric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FabricSpec {
    pub asn_base: u32,
    pub loopback_pool: Ipv4Net,
    pub link_pool: Ipv4Net,
    pub spine_count: u32,
    pub leaf_count: u32,
    /// Distance between the first spine ASN and the first leaf ASN
    pub leaf_asn_offset: Option<u32>,
    pub vlan_base: u16,
    pub zones: Vec<ZoneSpec>,
}

/// ZoneSpec is one tenant overlay zone and its ordered subnets
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneSpec {
    pub name: String,
    pub vni_base: u32,
    pub subnets: Vec<Ipv4Net>,
}

// Raw document shape. Every field is optional so a missing key becomes a
// SpecParse error naming the dotted path instead of a generic serde message.

#[derive(Debug, Deserialize)]
struct SpecDocument {
    #[serde(default)]
    fabric: Option<FabricSection>,
    #[serde(default)]
    spines: Option<CountSection>,
    #[serde(default)]
    leafs: Option<CountSection>,
    #[serde(default)]
    zones: Vec<ZoneDocument>,
}

#[derive(Debug, Deserialize)]
struct FabricSection {
    #[serde(default)]
    asn: Option<u32>,
    #[serde(default)]
    underlay: Option<UnderlaySection>,
    #[serde(default)]
    leaf_asn_offset: Option<u32>,
    #[serde(default)]
    vlan_base: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct UnderlaySection {
    #[serde(default)]
    loopback_pool: Option<String>,
    #[serde(default)]
    link_pool: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CountSection {
    #[serde(default)]
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ZoneDocument {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    vni_base: Option<u32>,
    #[serde(default)]
    subnets: Option<Vec<String>>,
}

impl FabricSpec {
    /// Read and parse a YAML fabric spec from disk
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fabric spec {}", path.display()))?;
        let spec = Self::from_yaml_str(&content)?;
        tracing::info!(
            "Loaded fabric spec {} ({} spines, {} leafs, {} zones)",
            path.display(),
            spec.spine_count,
            spec.leaf_count,
            spec.zones.len()
        );
        Ok(spec)
    }

    /// Parse a YAML fabric spec
    pub fn from_yaml_str(content: &str) -> AllocationResult<Self> {
        let doc: SpecDocument = serde_yaml_ng::from_str(content)
            .map_err(|e| AllocationError::spec_parse("document", e.to_string()))?;
        Self::from_document(doc)
    }

    fn from_document(doc: SpecDocument) -> AllocationResult<Self> {
        let fabric = doc.fabric.ok_or_else(|| missing("fabric"))?;
        let asn_base = fabric.asn.ok_or_else(|| missing("fabric.asn"))?;
        let underlay = fabric.underlay.ok_or_else(|| missing("fabric.underlay"))?;

        let loopback_raw = underlay
            .loopback_pool
            .ok_or_else(|| missing("fabric.underlay.loopback_pool"))?;
        let loopback_pool = parse_cidr("fabric.underlay.loopback_pool", &loopback_raw)?;

        let link_raw = underlay
            .link_pool
            .ok_or_else(|| missing("fabric.underlay.link_pool"))?;
        let link_pool = parse_cidr("fabric.underlay.link_pool", &link_raw)?;

        let spine_count = parse_count("spines.count", doc.spines)?;
        let leaf_count = parse_count("leafs.count", doc.leafs)?;

        let mut names = HashSet::new();
        let mut zones = Vec::with_capacity(doc.zones.len());
        for (idx, zone) in doc.zones.into_iter().enumerate() {
            let name = zone
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .ok_or_else(|| missing(format!("zones[{}].name", idx)))?;
            if !names.insert(name.clone()) {
                return Err(AllocationError::spec_parse(
                    format!("zones[{}].name", idx),
                    format!("duplicate zone name {:?}", name),
                ));
            }
            let vni_base = zone
                .vni_base
                .ok_or_else(|| missing(format!("zones[{}].vni_base", idx)))?;
            let subnets = zone
                .subnets
                .as_ref()
                .ok_or_else(|| missing(format!("zones[{}].subnets", idx)))?
                .iter()
                .enumerate()
                .map(|(i, raw)| parse_cidr(&format!("zones[{}].subnets[{}]", idx, i), raw))
                .collect::<AllocationResult<Vec<_>>>()?;
            zones.push(ZoneSpec {
                name,
                vni_base,
                subnets,
            });
        }

        Ok(Self {
            asn_base,
            loopback_pool,
            link_pool,
            spine_count,
            leaf_count,
            leaf_asn_offset: fabric.leaf_asn_offset,
            vlan_base: fabric.vlan_base.unwrap_or(DEFAULT_VLAN_BASE),
            zones,
        })
    }

    /// Total number of tenant subnets across every zone
    pub fn subnet_count(&self) -> usize {
        self.zones.iter().map(|z| z.subnets.len()).sum()
    }
}

fn missing(field: impl Into<String>) -> AllocationError {
    AllocationError::spec_parse(field, "required field is missing")
}

fn parse_count(field: &str, section: Option<CountSection>) -> AllocationResult<u32> {
    let count = section
        .and_then(|s| s.count)
        .ok_or_else(|| missing(field))?;
    if count == 0 {
        return Err(AllocationError::spec_parse(field, "must be at least 1"));
    }
    Ok(count)
}

/// Strict IPv4 CIDR parsing: host bits must be clear
fn parse_cidr(field: &str, raw: &str) -> AllocationResult<Ipv4Net> {
    let net: Ipv4Net = raw.trim().parse().map_err(|e| {
        AllocationError::spec_parse(field, format!("{:?} is not an IPv4 CIDR: {}", raw, e))
    })?;
    if net.trunc() != net {
        return Err(AllocationError::spec_parse(
            field,
            format!("{} has host bits set (did you mean {}?)", raw, net.trunc()),
        ));
    }
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
fabric:
  asn: 65000
  underlay:
    loopback_pool: 10.255.0.0/24
    link_pool: 10.1.0.0/24
spines:
  count: 2
leafs:
  count: 4
zones:
  - name: blue
    vni_base: 5000
    subnets: ["10.0.1.0/24", "10.0.2.0/24"]
  - name: red
    vni_base: 6000
    subnets: ["10.1.1.0/24"]
"#;

    #[test]
    fn test_parse_sample() {
        let spec = FabricSpec::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(spec.asn_base, 65000);
        assert_eq!(spec.loopback_pool, "10.255.0.0/24".parse::<Ipv4Net>().unwrap());
        assert_eq!(spec.spine_count, 2);
        assert_eq!(spec.leaf_count, 4);
        assert_eq!(spec.leaf_asn_offset, None);
        assert_eq!(spec.vlan_base, DEFAULT_VLAN_BASE);
        assert_eq!(spec.zones.len(), 2);
        assert_eq!(spec.zones[0].name, "blue");
        assert_eq!(spec.zones[0].subnets.len(), 2);
        assert_eq!(spec.subnet_count(), 3);
    }

    #[test]
    fn test_parse_optional_fields() {
        let doc = SAMPLE.replace(
            "  asn: 65000\n",
            "  asn: 65000\n  leaf_asn_offset: 10\n  vlan_base: 200\n",
        );
        let spec = FabricSpec::from_yaml_str(&doc).unwrap();
        assert_eq!(spec.leaf_asn_offset, Some(10));
        assert_eq!(spec.vlan_base, 200);
    }

    #[test]
    fn test_missing_link_pool() {
        let doc = SAMPLE.replace("    link_pool: 10.1.0.0/24\n", "");
        let err = FabricSpec::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SpecParse { ref field, .. } if field == "fabric.underlay.link_pool"
        ));
    }

    #[test]
    fn test_missing_zone_subnets() {
        let doc = SAMPLE.replace("    subnets: [\"10.1.1.0/24\"]\n", "");
        let err = FabricSpec::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SpecParse { ref field, .. } if field == "zones[1].subnets"
        ));

        // An explicit empty list is a zone with no subnets
        let doc = SAMPLE.replace("[\"10.1.1.0/24\"]", "[]");
        let spec = FabricSpec::from_yaml_str(&doc).unwrap();
        assert!(spec.zones[1].subnets.is_empty());
    }

    #[test]
    fn test_zero_spines_rejected() {
        let doc = SAMPLE.replace("spines:\n  count: 2", "spines:\n  count: 0");
        let err = FabricSpec::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SpecParse { ref field, .. } if field == "spines.count"
        ));
    }

    #[test]
    fn test_host_bits_rejected() {
        let doc = SAMPLE.replace("10.0.2.0/24", "10.0.2.5/24");
        let err = FabricSpec::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SpecParse { ref field, .. } if field == "zones[0].subnets[1]"
        ));
    }

    #[test]
    fn test_ipv6_pool_rejected() {
        let doc = SAMPLE.replace("10.255.0.0/24", "fd00::/64");
        assert!(matches!(
            FabricSpec::from_yaml_str(&doc),
            Err(AllocationError::SpecParse { .. })
        ));
    }

    #[test]
    fn test_duplicate_zone_name_rejected() {
        let doc = SAMPLE.replace("name: red", "name: blue");
        let err = FabricSpec::from_yaml_str(&doc).unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SpecParse { ref field, .. } if field == "zones[1].name"
        ));
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let doc = SAMPLE.replace("asn: 65000", "asn: not-a-number");
        assert!(matches!(
            FabricSpec::from_yaml_str(&doc),
            Err(AllocationError::SpecParse { ref field, .. }) if field == "document"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let spec = FabricSpec::load(&path).unwrap();
        assert_eq!(spec.leaf_count, 4);
        assert!(FabricSpec::load(dir.path().join("missing.yaml")).is_err());
    }
}
