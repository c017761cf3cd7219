//! callscope CLI: inspect call-site tables and drive a demo workload.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use callscope::catalog::catalog;
use callscope::classify::{Interrupted, NetworkError, StatusError};
use callscope::config::Config;
use callscope::details::Details;
use callscope::label::{Label, TAG_ADDRESS, TAG_ID, TAG_IDEMPOTENT};
use callscope::registry::Registry;
use callscope::registry::memory::MemoryRegistry;
use callscope::site::{Binding, Bound, Table};
use callscope::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "callscope", about = "Call-site lifecycle metrics")]
struct Cli {
    /// Event groups to bind (comma separated); overrides CALLSCOPE_DETAILS
    #[arg(long, global = true)]
    details: Option<Details>,
    /// Directory of extra call-site TOML tables; overrides CALLSCOPE_SITES
    #[arg(long, global = true)]
    sites: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the bound call-site table as JSON
    Sites,
    /// Run a synthetic workload through the bound call sites
    Demo {
        /// Number of simulated invocations per call site
        #[arg(long, default_value_t = 20)]
        invocations: usize,
        /// Deadline applied to simulated dials, in milliseconds
        #[arg(long, default_value_t = 15)]
        timeout_ms: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(details) = cli.details {
        config.details = details;
    }
    if let Some(sites) = cli.sites {
        config.sites_dir = Some(sites);
    }

    match cli.command {
        Command::Sites => cmd_sites(&config),
        Command::Demo {
            invocations,
            timeout_ms,
        } => cmd_demo(&config, invocations, Duration::from_millis(timeout_ms)).await,
    }
}

#[derive(Serialize)]
struct SiteRow<'a> {
    key: String,
    metric: &'a str,
    group: Details,
    config: &'a callscope::scope::Config,
    tags: &'a [String],
}

fn cmd_sites(config: &Config) -> anyhow::Result<()> {
    let table = config.table()?;
    let bound = Bound::bind(&config.root(Arc::new(MemoryRegistry::new())), &table);

    let rows: Vec<SiteRow<'_>> = table
        .sites()
        .iter()
        .filter_map(|site| {
            let scope = bound.get(&site.key())?;
            Some(SiteRow {
                key: site.key(),
                metric: scope.name(),
                group: site.group,
                config: &site.config,
                tags: &site.tags,
            })
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Demo workload
// ---------------------------------------------------------------------------

struct DialInfo {
    address: String,
}

fn dial_labels(info: &DialInfo) -> Vec<Label> {
    vec![Label::new(TAG_ADDRESS, info.address.clone())]
}

struct RetryInfo {
    id: Uuid,
    idempotent: bool,
}

fn retry_labels(info: &RetryInfo) -> Vec<Label> {
    vec![
        Label::new(TAG_IDEMPOTENT, info.idempotent.to_string()),
        Label::new(TAG_ID, info.id.to_string()),
    ]
}

/// Pretend dial: every fifth attempt stalls past any sane deadline, every
/// seventh is refused.
async fn fake_dial(n: usize) -> Result<(), NetworkError> {
    if n % 5 == 4 {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    if n % 7 == 6 {
        return Err(NetworkError::new(
            "dial",
            io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
        ));
    }
    Ok(())
}

async fn run_dials(dial: Binding<DialInfo>, invocations: usize, timeout: Duration) {
    let mut tasks = tokio::task::JoinSet::new();
    for n in 0..invocations {
        let dial = dial.clone();
        tasks.spawn(async move {
            let info = DialInfo {
                address: format!("node-{}:2135", n % 3),
            };
            let trace = dial.start(&info);
            let labels = dial.labels(&info);
            match tokio::time::timeout(timeout, fake_dial(n)).await {
                Ok(result) => {
                    trace.sync_result(&result, &labels);
                }
                Err(elapsed) => {
                    trace.sync(Some(&elapsed), &labels);
                }
            }
        });
    }
    while tasks.join_next().await.is_some() {}
}

fn run_retries(retry: &Binding<RetryInfo>, invocations: usize) {
    for n in 0..invocations {
        let info = RetryInfo {
            id: Uuid::new_v4(),
            idempotent: n % 2 == 0,
        };
        let labels = retry.labels(&info);
        let staged = |stage: &str| {
            let mut l = labels.clone();
            l.push(Label::stage(stage));
            l
        };

        let trace = retry.start(&info);
        let attempts = 1 + n % 4;
        for attempt in 1..attempts {
            let err = StatusError::operation("UNAVAILABLE", 400050);
            trace.sync(Some(&err), &staged("intermediate"));
            info!(attempt, "retrying");
        }
        if n % 9 == 8 {
            trace.sync_with_value(Some(&Interrupted::Canceled), attempts as f64, &staged("finish"));
        } else {
            trace.sync_with_value(None, attempts as f64, &staged("finish"));
        }
    }
}

async fn cmd_demo(config: &Config, invocations: usize, timeout: Duration) -> anyhow::Result<()> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "callscope-demo".to_string(),
        service_version: config.version.to_string(),
        log_level: config.log_level.clone(),
    })?;

    let memory = Arc::new(MemoryRegistry::new());
    let registry: Arc<dyn Registry> = if guard.is_exporting() {
        Arc::new(guard.registry())
    } else {
        memory.clone()
    };

    let table: Table = config.table()?;
    let bound = Bound::bind(&config.root(registry), &table);

    if let Some(dial) = bound.binding("driver.net.dial", dial_labels) {
        run_dials(dial, invocations, timeout).await;
    }
    if let Some(retry) = bound.binding("retry", retry_labels) {
        run_retries(&retry, invocations);
    }
    if let Some(discovery) = bound.get("discovery") {
        let address = [Label::new(TAG_ADDRESS, "discovery:2135")];
        discovery
            .start(&address)
            .sync_with_value(None, catalog().len() as f64, &address);
    }

    if guard.is_exporting() {
        guard.force_flush();
        info!("metrics flushed to OTLP endpoint");
    } else {
        println!("{}", serde_json::to_string_pretty(&memory.snapshot())?);
    }
    Ok(())
}
