//! Zentinel API Versioning - CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zentinel_api_versioning::headers::gone_response_body;
use zentinel_api_versioning::metrics::VersionMetrics;
use zentinel_api_versioning::{LifecycleStatus, VersionEngine, VersioningSettings};

#[derive(Parser, Debug)]
#[command(
    name = "zentinel-api-versioning",
    about = "API version detection and lifecycle engine for Zentinel proxy",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "api-versioning.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,

    /// Request path to evaluate
    #[arg(long, default_value = "/")]
    path: String,

    /// Raw query string of the request (without '?')
    #[arg(long)]
    query: Option<String>,

    /// Request header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Route name reported to deprecated-use tracking
    #[arg(long, default_value = "cli")]
    route: String,

    /// Print Prometheus metrics after the report
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print default config if requested
    if args.print_config {
        let default_config = include_str!("../config/default-config.yaml");
        println!("{}", default_config);
        return Ok(());
    }

    // Load configuration
    let settings = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        VersioningSettings::from_file(&args.config)?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration");
        VersioningSettings::default()
    };

    // Validate and exit if requested
    if args.validate {
        settings.validate()?;
        println!("Configuration is valid");
        return Ok(());
    }

    let metrics = Arc::new(VersionMetrics::new(&settings.metrics.prefix)?);
    let (used_tx, mut used_rx) = mpsc::unbounded_channel();

    let mut builder = settings.to_builder().on_deprecated_use({
        let metrics = Arc::clone(&metrics);
        move |version: &str, route: &str| {
            metrics.record_deprecated_use(version, route);
            let _ = used_tx.send(());
        }
    });
    if settings.metrics.enabled {
        builder = builder.observer(metrics.clone());
    }

    let engine = VersionEngine::new(builder.build()?);
    metrics.observe_sunsets(engine.config());

    let request = build_request(&args)?;
    let detection = engine.detect(&request);

    let mut response_headers: HashMap<String, String> = HashMap::new();
    let sunset =
        engine.set_lifecycle_headers(&mut response_headers, &detection.version, &args.route);

    let mut report = serde_json::json!({
        "version": &detection.version,
        "strategy": detection.strategy.map(|s| s.as_str()),
        "should_apply_versioning": engine.should_apply_versioning(&args.path),
        "path_segment": engine.extract_path_segment(&args.path),
        "stripped_path": engine.strip_path_version(&args.path, &detection.version),
        "sunset": sunset,
        "headers": response_headers,
    });

    match engine.lifecycle_status(&detection.version) {
        LifecycleStatus::Expired { sunset } => {
            let body = gone_response_body(
                &detection.version,
                Some(&sunset),
                engine.config().deprecation_link(&detection.version),
            );
            report["gone_body"] = serde_json::from_str(&body)?;
        }
        LifecycleStatus::Deprecated { .. } => {
            // The callback runs off the request path; wait so the usage
            // counter is included in the metrics output.
            if tokio::time::timeout(Duration::from_secs(1), used_rx.recv())
                .await
                .is_err()
            {
                tracing::warn!("Deprecated-use callback did not complete in time");
            }
        }
        LifecycleStatus::Active => {}
    }

    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        print!("{}", metrics.encode());
    }

    Ok(())
}

fn build_request(args: &Args) -> Result<http::Request<()>> {
    let uri = match &args.query {
        Some(query) if !query.is_empty() => format!("{}?{}", args.path, query),
        _ => args.path.clone(),
    };

    let mut builder = http::Request::builder().uri(uri);
    for header in &args.headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header must be 'Name: value', got {:?}", header))?;
        builder = builder.header(name.trim(), value.trim());
    }

    builder.body(()).context("Invalid request")
}
