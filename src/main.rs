use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fabric_forge::config::Config;
use fabric_forge::health::{self, SshProbe};
use fabric_forge::models::FabricSpec;
use fabric_forge::render::Renderer;
use fabric_forge::{allocator, report};

/// FabricForge - EVPN/VXLAN Clos fabric builder and validator
#[derive(Parser)]
#[command(name = "fabric-forge")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate addresses and identifiers, then render device configs
    Build(BuildArgs),
    /// Collect BGP/EVPN/VXLAN health from devices and write a report
    Validate(ValidateArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Fabric spec YAML (defaults to FABRIC_SPEC)
    #[arg(short, long)]
    spec: Option<PathBuf>,

    /// Directory for rendered configs (defaults to FABRIC_OUTPUT_DIR)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory holding spine.tera / leaf.tera overrides
    #[arg(short, long)]
    templates: Option<PathBuf>,

    /// Show the allocation without writing any files
    #[arg(long)]
    dry_run: bool,

    /// Print the allocation record as JSON instead of tables
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ValidateArgs {
    /// Device address to check (repeatable)
    #[arg(short, long = "device", required = true)]
    devices: Vec<String>,

    #[arg(short, long)]
    username: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Report file (defaults to FABRIC_REPORT)
    #[arg(short, long)]
    report: Option<PathBuf>,

    /// Concurrent device checks (defaults to FABRIC_HEALTH_WORKERS)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fabric_forge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = Config::load();

    match cli.command {
        Commands::Build(args) => build(args, &cfg),
        Commands::Validate(args) => validate(args, &cfg).await,
    }
}

fn build(args: BuildArgs, cfg: &Config) -> Result<()> {
    let spec_path = args.spec.unwrap_or_else(|| cfg.spec_path.clone());
    let spec = FabricSpec::load(&spec_path)?;
    let record = allocator::allocate(&spec)
        .with_context(|| format!("Allocation failed for {}", spec_path.display()))?;

    if args.json {
        println!("{}", record.to_json()?);
    } else {
        println!("{}", report::summary_tables(&record));
    }

    if args.dry_run {
        tracing::info!("Dry run: no configs written");
        return Ok(());
    }

    let templates_dir = args.templates.or_else(|| cfg.templates_dir.clone());
    let renderer = Renderer::new(templates_dir.as_deref())?;
    let output_dir = args.output.unwrap_or_else(|| cfg.output_dir.clone());
    let written = renderer.write_all(&record, &output_dir)?;
    tracing::info!("Wrote {} configs to {}", written.len(), output_dir.display());
    Ok(())
}

async fn validate(args: ValidateArgs, cfg: &Config) -> Result<()> {
    let username = args.username.unwrap_or_else(|| cfg.ssh_user.clone());
    if username.is_empty() {
        bail!("SSH username required: pass --username or set FABRIC_SSH_USER");
    }
    let password = args.password.unwrap_or_else(|| cfg.ssh_pass.clone());
    let workers = args.workers.unwrap_or(cfg.health_workers);

    let probe = Arc::new(SshProbe::new(username, password, cfg.ssh_timeout_secs));
    let results = health::run_health_checks(probe, &args.devices, workers).await;
    println!("{}", report::health_table(&results));

    let report_path = args.report.unwrap_or_else(|| cfg.report_path.clone());
    std::fs::write(&report_path, report::health_report(&results, chrono::Utc::now()))
        .with_context(|| format!("Failed to write report {}", report_path.display()))?;
    tracing::info!("Report saved to {}", report_path.display());

    tracing::info!(
        "Devices validated: {}, failed: {}",
        results.checked().count(),
        results.failed().count()
    );
    if results.is_healthy() {
        tracing::info!("Fabric health: GOOD");
    } else {
        tracing::warn!("Fabric health: ISSUES DETECTED");
    }
    Ok(())
}
