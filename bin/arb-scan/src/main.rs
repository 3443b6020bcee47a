//! CLI adapter for the arbitrage analytics engine.
//!
//! Reads a JSON request, runs the requested operation against a fresh
//! engine context, prints the response envelope to stdout, and exits with
//! 0 (ok), 2 (invalid input), 3 (cancelled/timeout) or 4 (internal).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::config::EngineConfig;
use engine::pipeline::ScanRequest;
use engine::service::EngineService;
use engine::{api, EngineContext};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "arb-scan", about = "Arbitrage detection and execution-risk analytics")]
struct Cli {
    /// Path to a YAML engine configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a full scan from a JSON request (file, or stdin when omitted).
    Scan {
        /// JSON file holding the scan request body.
        #[arg(long)]
        input: Option<PathBuf>,

        /// Override the configured per-scan timeout.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Scan the built-in simulated market.
    QuickScan {
        #[arg(long, default_value_t = 10_000.0)]
        capital: f64,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long, default_value_t = 500)]
        mc_samples: usize,

        /// Run the stress battery for every cycle.
        #[arg(long)]
        stress: bool,

        /// Use the injected live source instead of the simulated market.
        #[arg(long)]
        use_real_data: bool,
    },
    /// Print the global engine metrics.
    Metrics,
}

/// Exit code of a finished operation, per the adapter contract.
fn exit_code_of(error_kind: Option<&str>) -> i32 {
    match error_kind {
        None => 0,
        Some("invalid_input") => 2,
        Some("cancelled") => 3,
        Some(_) => 4,
    }
}

fn print_envelope<T: serde::Serialize>(response: &api::ApiResponse<T>) -> Result<i32> {
    let body = serde_json::to_string_pretty(response).context("serializing response envelope")?;
    println!("{body}");
    Ok(exit_code_of(response.error_kind()))
}

fn read_scan_request(input: Option<&PathBuf>) -> Result<ScanRequest> {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading request from {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("reading request from stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("parsing scan request JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let code = match cli.command {
        Command::Scan { input, timeout_ms } => {
            if let Some(ms) = timeout_ms {
                config.scan.timeout_ms = ms;
            }
            let request = match read_scan_request(input.as_ref()) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!("malformed request: {e:#}");
                    eprintln!("{e:#}");
                    std::process::exit(2);
                }
            };

            let ctx = Arc::new(EngineContext::new(config));
            let (handle, service) = EngineService::channel(ctx, 1);
            let service_task = tokio::spawn(service.run());
            let response = handle.scan(request).await;
            handle.shutdown().await;
            let _ = service_task.await;
            print_envelope(&response)?
        }
        Command::QuickScan {
            capital,
            seed,
            mc_samples,
            stress,
            use_real_data,
        } => {
            let ctx = EngineContext::new(config);
            let response = api::quick_scan(
                &ctx,
                &api::QuickScanRequest {
                    capital,
                    use_real_data,
                    mc_samples: Some(mc_samples),
                    run_stress: stress,
                    seed,
                },
                &tokio_util::sync::CancellationToken::new(),
            );
            print_envelope(&response)?
        }
        Command::Metrics => {
            let ctx = EngineContext::new(config);
            let response = api::metrics(&ctx);
            print_envelope(&response)?
        }
    };

    std::process::exit(code);
}
