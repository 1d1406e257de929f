//! Fabric health aggregation.
//!
//! Devices are checked concurrently by a bounded set of tasks. Each task owns
//! its device session for the whole check and sends exactly one result to a
//! single collector, which assembles the [`HealthReport`] in submission order.

pub mod parse;

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::{mpsc, Semaphore};

use crate::models::{DeviceHealth, DeviceOutcome, DeviceResult, HealthReport};
use crate::utils;

pub const DEFAULT_WORKERS: usize = 5;

const BGP_SUMMARY: &str = "show bgp summary";
const EVPN_DATABASE: &str = "show evpn database";
const REMOTE_VTEPS: &str = "show ethernet-switching vxlan-tunnel-end-point remote";
const INTERFACES_TERSE: &str = "show interfaces terse";

/// Something that can collect health data from one device
#[async_trait]
pub trait DeviceProbe: Send + Sync {
    async fn check(&self, host: &str) -> Result<DeviceHealth>;
}

/// Probe that logs into Junos devices over SSH
#[derive(Debug, Clone)]
pub struct SshProbe {
    username: String,
    password: String,
    timeout_secs: u64,
}

impl SshProbe {
    pub fn new(username: impl Into<String>, password: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            timeout_secs,
        }
    }
}

#[async_trait]
impl DeviceProbe for SshProbe {
    async fn check(&self, host: &str) -> Result<DeviceHealth> {
        if !utils::is_valid_device_address(host) {
            bail!("invalid device address {:?}", host);
        }
        let host = host.to_string();
        let user = self.username.clone();
        let pass = self.password.clone();
        let timeout = self.timeout_secs;

        tokio::task::spawn_blocking(move || collect_over_ssh(&host, &user, &pass, timeout))
            .await
            .map_err(|e| anyhow!("Task join error: {}", e))?
    }
}

/// Run every show command over a single session owned by this call
fn collect_over_ssh(host: &str, user: &str, pass: &str, timeout_secs: u64) -> Result<DeviceHealth> {
    let session = utils::ssh_connect(host, user, pass, timeout_secs).map_err(anyhow::Error::msg)?;
    let run = |cmd: &str| utils::ssh_exec(&session, cmd).map_err(anyhow::Error::msg);

    let health = DeviceHealth {
        bgp: parse::bgp_neighbors(&run(BGP_SUMMARY)?),
        evpn: parse::evpn_instances(&run(EVPN_DATABASE)?),
        vteps: parse::remote_vteps(&run(REMOTE_VTEPS)?),
        interfaces: parse::physical_interfaces(&run(INTERFACES_TERSE)?),
    };
    let _ = session.disconnect(None, "health check complete", None);
    Ok(health)
}

/// Check all hosts with at most `workers` probes in flight.
///
/// Returns once every host has a result. A failing or panicking check only
/// marks its own device as failed.
pub async fn run_health_checks<P>(probe: Arc<P>, hosts: &[String], workers: usize) -> HealthReport
where
    P: DeviceProbe + ?Sized + 'static,
{
    let workers = workers.max(1);
    tracing::info!("Checking {} devices with {} workers", hosts.len(), workers);

    let permits = Arc::new(Semaphore::new(workers));
    let (result_tx, mut result_rx) = mpsc::channel::<(usize, DeviceResult)>(hosts.len().max(1));

    let mut handles = Vec::with_capacity(hosts.len());
    for (index, host) in hosts.iter().enumerate() {
        let probe = probe.clone();
        let permits = permits.clone();
        let result_tx = result_tx.clone();
        let host = host.clone();

        handles.push(tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            tracing::debug!("Checking {}", host);
            let outcome = match probe.check(&host).await {
                Ok(health) => {
                    tracing::info!(
                        "{}: BGP {}/{} established, {} VTEPs",
                        host,
                        health.bgp_up(),
                        health.bgp.len(),
                        health.vteps.len()
                    );
                    DeviceOutcome::Checked(health)
                }
                Err(e) => {
                    tracing::warn!("Health check failed for {}: {:#}", host, e);
                    DeviceOutcome::Failed {
                        error: format!("{:#}", e),
                    }
                }
            };
            if let Err(e) = result_tx.send((index, DeviceResult { host, outcome })).await {
                tracing::warn!("Health collector gone: {}", e);
            }
        }));
    }
    drop(result_tx);

    let mut slots: Vec<Option<DeviceResult>> = vec![None; hosts.len()];
    while let Some((index, result)) = result_rx.recv().await {
        slots[index] = Some(result);
    }

    // A task that died before sending still owes its device a result
    for (index, handle) in handles.into_iter().enumerate() {
        if let Err(e) = handle.await {
            tracing::warn!("Health task for {} aborted: {}", hosts[index], e);
            if slots[index].is_none() {
                slots[index] = Some(DeviceResult {
                    host: hosts[index].clone(),
                    outcome: DeviceOutcome::Failed {
                        error: format!("health task aborted: {}", e),
                    },
                });
            }
        }
    }

    let devices = slots
        .into_iter()
        .zip(hosts)
        .map(|(slot, host)| {
            slot.unwrap_or_else(|| DeviceResult {
                host: host.clone(),
                outcome: DeviceOutcome::Failed {
                    error: "no result reported".to_string(),
                },
            })
        })
        .collect();

    HealthReport { devices }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BgpNeighbor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl MockProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DeviceProbe for MockProbe {
        async fn check(&self, host: &str) -> Result<DeviceHealth> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            // Longer names finish sooner so completion order differs from input order
            let delay = 40u64.saturating_sub(host.len() as u64 * 2);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match host {
                "unreachable" => bail!("TCP connection failed: connection refused"),
                "crashing" => panic!("probe crashed"),
                _ => Ok(DeviceHealth {
                    bgp: vec![BgpNeighbor {
                        address: "10.1.0.0".to_string(),
                        state: "Establ".to_string(),
                    }],
                    ..Default::default()
                }),
            }
        }
    }

    fn hosts(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_never_exceeds_worker_limit() {
        let probe = Arc::new(MockProbe::new());
        let names: Vec<String> = (0..12).map(|i| format!("leaf{}", i)).collect();
        let report = run_health_checks(probe.clone(), &names, 3).await;

        assert_eq!(report.devices.len(), 12);
        assert!(probe.peak.load(Ordering::SeqCst) <= 3);
        assert!(probe.peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(probe.in_flight.load(Ordering::SeqCst), 0);
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_order_preserved() {
        let probe = Arc::new(MockProbe::new());
        let names = hosts(&["spine1", "unreachable", "leaf1", "a"]);
        let report = run_health_checks(probe, &names, DEFAULT_WORKERS).await;

        let order: Vec<&str> = report.devices.iter().map(|d| d.host.as_str()).collect();
        assert_eq!(order, vec!["spine1", "unreachable", "leaf1", "a"]);
        assert_eq!(report.checked().count(), 3);
        let failed: Vec<(&str, &str)> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "unreachable");
        assert!(failed[0].1.contains("connection refused"));
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_panicking_probe_marks_only_its_device() {
        let probe = Arc::new(MockProbe::new());
        let names = hosts(&["leaf1", "crashing", "leaf2"]);
        let report = run_health_checks(probe, &names, 2).await;

        assert_eq!(report.devices.len(), 3);
        assert!(matches!(report.devices[0].outcome, DeviceOutcome::Checked(_)));
        assert!(matches!(
            report.devices[1].outcome,
            DeviceOutcome::Failed { ref error } if error.contains("aborted")
        ));
        assert!(matches!(report.devices[2].outcome, DeviceOutcome::Checked(_)));
    }

    #[tokio::test]
    async fn test_no_hosts_yields_empty_report() {
        let report = run_health_checks(Arc::new(MockProbe::new()), &[], 0).await;
        assert!(report.devices.is_empty());
        assert!(!report.is_healthy());
    }

    #[tokio::test]
    async fn test_ssh_probe_rejects_bad_address() {
        let probe = SshProbe::new("admin", "secret", 1);
        let err = probe.check("leaf;reboot").await.unwrap_err();
        assert!(err.to_string().contains("invalid device address"));

        let probe: Arc<dyn DeviceProbe> = Arc::new(probe);
        let report = run_health_checks(probe, &hosts(&["bad host"]), 1).await;
        assert_eq!(report.failed().count(), 1);
    }

    #[test]
    fn test_mock_probe_direct() {
        let probe = MockProbe::new();
        let health = tokio_test::block_on(probe.check("leaf1"));
        tokio_test::assert_ok!(health);
        assert!(tokio_test::block_on(probe.check("unreachable")).is_err());
    }
}
