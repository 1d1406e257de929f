use std::env;
use std::path::PathBuf;

use crate::health::DEFAULT_WORKERS;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub spec_path: PathBuf,
    pub output_dir: PathBuf,
    pub templates_dir: Option<PathBuf>,
    pub report_path: PathBuf,
    pub health_workers: usize,
    pub ssh_timeout_secs: u64,
    pub ssh_user: String,
    pub ssh_pass: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        let templates_dir = get_env("FABRIC_TEMPLATES_DIR", "");
        Self {
            spec_path: get_env("FABRIC_SPEC", "configs/fabric.yaml").into(),
            output_dir: get_env("FABRIC_OUTPUT_DIR", "configs/generated").into(),
            templates_dir: (!templates_dir.is_empty()).then(|| PathBuf::from(templates_dir)),
            report_path: get_env("FABRIC_REPORT", "validation_report.txt").into(),
            health_workers: get_env("FABRIC_HEALTH_WORKERS", "")
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_WORKERS),
            ssh_timeout_secs: get_env("FABRIC_SSH_TIMEOUT", "30").parse().unwrap_or(30),
            ssh_user: get_env("FABRIC_SSH_USER", ""),
            ssh_pass: get_env("FABRIC_SSH_PASS", ""),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
