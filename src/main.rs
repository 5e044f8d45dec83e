//! eta-monitor command line.
//!
//! Thin wiring only: configuration, tracing, collaborators, then either the
//! periodic driver or a single one-shot evaluation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;

use eta_monitor::config::MonitorConfig;
use eta_monitor::driver::{Collaborators, Driver};
use eta_monitor::engine::Engine;
use eta_monitor::fleet::StaticFleet;
use eta_monitor::haversine::HaversineEstimator;
use eta_monitor::osrm::OsrmClient;
use eta_monitor::store::InMemoryReportStore;
use eta_monitor::tracking::{NoTracking, TrackingClient};
use eta_monitor::traits::{PositionResolver, ReportStore, RouteEstimator};

#[derive(Debug, Parser)]
#[command(name = "eta-monitor", version, about = "Arrival monitoring for mobile workers")]
struct Cli {
    /// OSRM endpoint; straight-line estimates are used without one.
    #[arg(long, global = true)]
    osrm_url: Option<String>,

    /// Tracking-service endpoint for live positions.
    #[arg(long, global = true)]
    tracking_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile every entity of a fleet file on a fixed period.
    Run {
        /// JSON fleet file with entities and appointments.
        #[arg(long)]
        fleet: PathBuf,

        /// Seconds between ticks.
        #[arg(long)]
        tick_secs: Option<u64>,

        /// Stop after this many ticks and print the reports.
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Evaluate one device against one appointment and print the report.
    Once {
        /// Device to locate; "demo" uses a fixed position.
        #[arg(long)]
        device_id: String,

        /// Appointment start, unix epoch milliseconds (UTC).
        #[arg(long)]
        timestamp: i64,

        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        /// Known current delay in minutes.
        #[arg(long, default_value_t = 0)]
        delay: u32,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = MonitorConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.osrm_url {
        config.osrm_url = Some(url);
    }
    if let Some(url) = cli.tracking_url {
        config.tracking_url = Some(url);
    }

    match cli.command {
        Command::Run {
            fleet,
            tick_secs,
            ticks,
        } => {
            if let Some(secs) = tick_secs {
                config.engine.tick_period = Duration::from_secs(secs);
            }
            config.validate().context("invalid configuration")?;
            run(config, fleet, ticks)
        }
        Command::Once {
            device_id,
            timestamp,
            lat,
            lon,
            delay,
        } => once(config, &device_id, timestamp, lat, lon, delay),
    }
}

fn run(config: MonitorConfig, fleet: PathBuf, ticks: Option<u64>) -> anyhow::Result<()> {
    let fleet = Arc::new(StaticFleet::load(&fleet).context("could not load fleet file")?);
    let store = Arc::new(InMemoryReportStore::new());
    let driver = Arc::new(build_driver(&config, fleet, Arc::clone(&store) as Arc<dyn ReportStore>)?);

    info!(
        tick_secs = config.engine.tick_period.as_secs(),
        workers = config.workers,
        "starting monitor"
    );
    Arc::clone(&driver)
        .spawn(ticks)
        .context("could not start driver thread")?
        .join();

    let mut entity_ids = store.entity_ids();
    entity_ids.sort();
    for entity_id in entity_ids {
        if let Some(report) = driver.latest_report(&entity_id) {
            println!(
                "{}",
                serde_json::json!({ "entityId": entity_id, "report": report })
            );
        }
    }
    Ok(())
}

fn once(
    config: MonitorConfig,
    device_id: &str,
    timestamp: i64,
    lat: f64,
    lon: f64,
    delay: u32,
) -> anyhow::Result<()> {
    let driver = build_driver(
        &config,
        Arc::new(StaticFleet::default()),
        Arc::new(InMemoryReportStore::new()),
    )?;
    let report = driver
        .evaluate_once(device_id, timestamp, lat, lon, delay, Utc::now())
        .with_context(|| format!("could not evaluate device {}", device_id))?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn build_driver(
    config: &MonitorConfig,
    fleet: Arc<StaticFleet>,
    store: Arc<dyn ReportStore>,
) -> anyhow::Result<Driver> {
    let estimator: Arc<dyn RouteEstimator> = match config.osrm() {
        Some(osrm) => Arc::new(OsrmClient::new(osrm).context("could not build OSRM client")?),
        None => Arc::new(HaversineEstimator::default()),
    };
    let positions: Arc<dyn PositionResolver> = match config.tracking() {
        Some(tracking) => {
            Arc::new(TrackingClient::new(tracking).context("could not build tracking client")?)
        }
        None => Arc::new(NoTracking),
    };

    let collaborators = Collaborators {
        schedule: fleet.clone(),
        positions,
        directory: fleet,
        store,
    };
    let engine = Engine::new(config.engine.clone(), estimator);
    Ok(Driver::new(
        engine,
        collaborators,
        config.time_zone,
        config.workers,
    )?)
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
