//! Subsystem assembly for each subcommand.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use swiftex_api::{ServeOptions, build_router};
use swiftex_collect::scheduler::RunOutcome;
use swiftex_collect::{Collector, Scheduler, discovery};
use swiftex_core::{DiscoveryConfig, ExporterConfig};
use swiftex_probe::{HttpReconClient, ReconProbe};
use swiftex_store::{MetricStore, render_exposition};
use tokio::sync::watch;
use tracing::{error, info, warn};

fn load_config(path: &Path) -> anyhow::Result<ExporterConfig> {
    let config = ExporterConfig::from_file(path)
        .with_context(|| format!("invalid config {}", path.display()))?;
    info!(
        path = %path.display(),
        collectors = config.collectors.len(),
        "config loaded"
    );
    Ok(config)
}

/// One collector per configured family, all sharing a probe client and a
/// discovery source.
fn build_scheduler(config: &ExporterConfig, store: MetricStore) -> Scheduler {
    let probe: Arc<dyn ReconProbe> = Arc::new(HttpReconClient::new());
    let discovery = discovery::from_config(&config.discovery);

    let mut scheduler = Scheduler::new(store);
    for collector in &config.collectors {
        scheduler.add(Collector::new(
            collector.clone(),
            Arc::clone(&probe),
            Arc::clone(&discovery),
        ));
    }
    scheduler
}

pub async fn run_serve(path: &Path, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    info!("swiftex exporter starting");

    let config = load_config(path)?;
    let addr = listen.unwrap_or(config.server.listen);

    // ── Initialize subsystems ──────────────────────────────────

    let store = MetricStore::new();
    let mut scheduler = build_scheduler(&config, store.clone());
    info!(families = ?scheduler.families(), "collectors initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    scheduler.start(shutdown_rx);

    // ── Start scrape server ────────────────────────────────────

    let router = build_router(
        store,
        ServeOptions {
            metrics_path: config.server.metrics_path.clone(),
        },
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, metrics_path = %config.server.metrics_path, "scrape server listening");

    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    if let Err(e) = server.await {
        error!(error = %e, "scrape server failed");
        scheduler.stop_all();
        return Err(e.into());
    }

    // Wait for in-flight runs to observe the signal.
    scheduler.join().await;

    info!("swiftex exporter stopped");
    Ok(())
}

pub fn check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;

    println!("listen:        {}", config.server.listen);
    println!("metrics path:  {}", config.server.metrics_path);
    match &config.discovery {
        DiscoveryConfig::Static(targets) => {
            println!("discovery:     static ({} nodes)", targets.len());
            for target in targets {
                println!("  - {target}");
            }
        }
        DiscoveryConfig::File { path, default_port } => {
            println!(
                "discovery:     file {} (default port {default_port})",
                path.display()
            );
        }
    }
    println!("collectors:");
    for c in &config.collectors {
        println!(
            "  - {:<14} interval={:?} probe_timeout={:?} run_ceiling={:?} concurrency={} retries={}",
            c.family.as_str(),
            c.interval,
            c.probe_timeout,
            c.run_ceiling,
            c.concurrency,
            c.retries
        );
        for (ring, hash) in &c.expected_ring_md5 {
            println!("      expect {ring} = {hash}");
        }
    }
    Ok(())
}

pub async fn collect_once(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let store = MetricStore::new();
    let scheduler = build_scheduler(&config, store.clone());

    let outcomes = scheduler.collect_once().await;
    for (family, outcome) in &outcomes {
        match outcome {
            RunOutcome::Published => info!(%family, "published"),
            RunOutcome::Failed => warn!(%family, "run failed"),
            RunOutcome::Disabled => error!(%family, "collector disabled"),
        }
    }

    let body = render_exposition(&store.snapshot()).context("failed to render exposition")?;
    print!("{body}");

    if !outcomes
        .iter()
        .any(|(_, outcome)| *outcome == RunOutcome::Published)
    {
        bail!("no family produced samples");
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
