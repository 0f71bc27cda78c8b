use anyhow::Result;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use ticketsync_demo::cli::{Cli, Commands};
use ticketsync_demo::models::{FeedConfig, SalesConfig};
use ticketsync_demo::server::run_server;
use ticketsync_demo::state::FeedState;
use ticketsync_demo::traffic::start_sales;
use ticketsync_demo::watcher::{load_config, run_watch, WatchOverrides};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            config,
            endpoint,
            source,
            push,
            interval_ms,
            purchase_every,
            verbose,
        } => {
            init_logging(verbose);

            let config = load_config(
                config.as_deref(),
                WatchOverrides {
                    endpoint,
                    source,
                    push,
                    interval_ms,
                },
            )?;

            info!(
                snapshot = %config.snapshot_url()?,
                push = ?config.push_address,
                interval_ms = config.polling_interval_ms,
                "Watching remaining tickets"
            );

            run_watch(config, purchase_every, shutdown_signal()).await?;
        }

        Commands::Serve {
            port,
            address,
            event_id,
            quota,
            remaining,
            rate,
            max_batch,
            allow_any_origin,
            verbose,
        } => {
            init_logging(verbose);

            let config = FeedConfig {
                event_id,
                total_quota: quota,
                remaining,
                sales_rate: rate,
                max_batch,
                allow_any_origin,
                ..Default::default()
            };

            let addr: SocketAddr = format!("{}:{}", address, port).parse()?;

            println!();
            println!("  ╔═══════════════════════════════════════════╗");
            println!("  ║                                           ║");
            println!("  ║   ticketsync  ·  mock ticket feed         ║");
            println!("  ║                                           ║");
            println!("  ╚═══════════════════════════════════════════╝");
            println!();
            println!("  Event:     {} ({} of {} left)", event_id, remaining.min(quota), quota);
            println!("  Snapshot:  http://{}/api/events", addr);
            println!("  Push:      ws://{}/ws?eventId={}", addr, event_id);
            println!();

            let state = FeedState::new(config).with_metrics(init_metrics()?);

            if rate > 0.0 {
                start_sales(
                    &state,
                    SalesConfig {
                        rate,
                        max_batch,
                        duration_secs: None,
                    },
                );
            }

            run_server(state, addr, shutdown_signal()).await?;
            info!("Feed stopped");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "ticketsync_demo=debug,ticketsync_client=debug,tower_http=debug"
    } else {
        "ticketsync_demo=info,ticketsync_client=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    metrics::describe_counter!(
        "ticketsync_feed_tickets_sold_total",
        "Tickets sold by the mock feed"
    );

    info!("Metrics exporter initialized");
    Ok(handle)
}
