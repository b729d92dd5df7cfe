use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use riskwatch_alert::NotificationDedupTracker;
use riskwatch_server::app;
use riskwatch_server::config::ServerConfig;
use riskwatch_server::scheduler::{self, NotifyScheduler};
use riskwatch_server::service::AlertQuery;
use riskwatch_server::state::{self, AppState};

const DEFAULT_CONFIG_PATH: &str = "config/riskwatch.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  riskwatch-server [config.toml]              Start the server");
    eprintln!("  riskwatch-server evaluate <config.toml>     Evaluate the current snapshot once and print alerts as JSON");
}

#[tokio::main]
async fn main() -> Result<()> {
    riskwatch_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("riskwatch=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("evaluate") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("evaluate requires <config.toml> argument")
            })?;
            run_evaluate(config_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or(DEFAULT_CONFIG_PATH);
            run_server(config_path).await
        }
    }
}

/// One-shot evaluation of the configured snapshot, printed to stdout.
#[allow(clippy::print_stdout)]
async fn run_evaluate(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let rules = state::open_rule_store(&config)?;
    let service = state::build_service(&config, rules)?;

    let mut query = AlertQuery::default();
    query.filters.project = config.snapshot.project.clone();
    let view = service.evaluate_on_demand(&query).await?;
    if view.degraded {
        anyhow::bail!("task snapshot unavailable");
    }
    println!("{}", serde_json::to_string_pretty(&view.items)?);
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.data_dir,
        utc_offset_hours = config.utc_offset_hours,
        scheduler_enabled = config.scheduler.enabled,
        "riskwatch-server starting"
    );

    let rules = state::open_rule_store(&config)?;
    let rule_log_handle = tokio::spawn(scheduler::log_rule_changes(rules.subscribe()));

    let service = Arc::new(state::build_service(&config, rules)?);
    let notifier = Arc::new(state::build_notifier(&config)?);
    let dedup = Arc::new(NotificationDedupTracker::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let notify_scheduler = Arc::new(NotifyScheduler::new(
        service.clone(),
        dedup,
        notifier,
        config.scheduler.interval_secs,
        shutdown_rx,
    ));

    let scheduler_handle = if config.scheduler.enabled {
        Some(tokio::spawn(notify_scheduler.clone().run()))
    } else {
        tracing::info!("Scheduled notifications disabled");
        None
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let state = AppState {
        service,
        scheduler: notify_scheduler,
        start_time: Utc::now(),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "HTTP server listening");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal::ctrl_c().await.ok();
            tracing::info!("Shutting down gracefully");
            let _ = shutdown_tx.send(true);
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server error");
    }

    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }
    rule_log_handle.abort();
    Ok(())
}
