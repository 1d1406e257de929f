use serde::Serialize;

/// One BGP peer as reported by `show bgp summary`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BgpNeighbor {
    pub address: String,
    pub state: String,
}

impl BgpNeighbor {
    pub fn is_established(&self) -> bool {
        // Junos prints "Establ" when the session carries routes
        self.state.starts_with("Establ")
    }
}

/// Fabric-facing physical interface status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceStatus {
    pub name: String,
    pub admin: String,
    pub oper: String,
}

impl InterfaceStatus {
    pub fn is_up(&self) -> bool {
        self.oper == "up"
    }
}

/// EVPN database instance with its learned MAC count
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvpnInstance {
    pub instance: String,
    pub mac_count: usize,
}

/// Remote VTEP seen by the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VtepEntry {
    pub remote_ip: String,
    pub vni: String,
}

/// Everything collected from one reachable device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceHealth {
    pub bgp: Vec<BgpNeighbor>,
    pub evpn: Vec<EvpnInstance>,
    pub vteps: Vec<VtepEntry>,
    pub interfaces: Vec<InterfaceStatus>,
}

impl DeviceHealth {
    pub fn bgp_up(&self) -> usize {
        self.bgp.iter().filter(|n| n.is_established()).count()
    }

    pub fn interfaces_up(&self) -> usize {
        self.interfaces.iter().filter(|i| i.is_up()).count()
    }

    pub fn total_macs(&self) -> usize {
        self.evpn.iter().map(|e| e.mac_count).sum()
    }

    pub fn all_bgp_up(&self) -> bool {
        self.bgp.iter().all(|n| n.is_established())
    }
}

/// Outcome of checking a single device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeviceOutcome {
    Checked(DeviceHealth),
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceResult {
    pub host: String,
    pub outcome: DeviceOutcome,
}

/// Merged result of a fabric health run, in the order devices were submitted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub devices: Vec<DeviceResult>,
}

impl HealthReport {
    pub fn checked(&self) -> impl Iterator<Item = (&str, &DeviceHealth)> {
        self.devices.iter().filter_map(|d| match &d.outcome {
            DeviceOutcome::Checked(health) => Some((d.host.as_str(), health)),
            DeviceOutcome::Failed { .. } => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.devices.iter().filter_map(|d| match &d.outcome {
            DeviceOutcome::Failed { error } => Some((d.host.as_str(), error.as_str())),
            DeviceOutcome::Checked(_) => None,
        })
    }

    /// Healthy when at least one device answered, none failed, and every BGP peer is established
    pub fn is_healthy(&self) -> bool {
        self.checked().next().is_some()
            && self.failed().next().is_none()
            && self.checked().all(|(_, h)| h.all_bgp_up())
    }
}
