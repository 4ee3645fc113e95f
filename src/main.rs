use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradepilot::application::handlers::journal_handler::build_router;
use tradepilot::application::services::{roll_all_accounts, JournalService};
use tradepilot::config::JournalConfig;
use tradepilot::persistence;
use tradepilot::task_runner::{run_with_circuit_breaker, CircuitBreakerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tradepilot=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("TradePilot journal starting...");

    let config = JournalConfig::from_env();
    let pool = persistence::connect(&config.database).await?;
    let service = Arc::new(JournalService::new(pool, config.statistics));

    if config.rollover.enabled {
        let rollover_service = service.clone();
        let runner_config = CircuitBreakerConfig {
            max_consecutive_failures: config.rollover.max_consecutive_failures,
            initial_retry_delay: Duration::from_secs(5),
            max_retry_delay: config.rollover.interval(),
            pass_interval: config.rollover.interval(),
        };
        info!(
            "Daily rollover every {}s (stops after {} consecutive failed passes)",
            config.rollover.interval_seconds, config.rollover.max_consecutive_failures
        );

        tokio::spawn(async move {
            let result = run_with_circuit_breaker("daily_rollover", runner_config, || {
                let store = rollover_service.clone();
                async move {
                    let today = Local::now().date_naive();
                    roll_all_accounts(store.as_ref(), today).await.map(|_| ())
                }
            })
            .await;

            let Err(e) = result;
            error!("Rollover job stopped: {}", e);
        });
    } else {
        warn!("Daily rollover job disabled");
    }

    let app = build_router(service, config.max_request_body_bytes);

    info!("Listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async move {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => {
                    error!("Failed to install Ctrl+C handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
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
    };

    info!("Server started successfully. Press Ctrl+C to stop.");
    server.with_graceful_shutdown(shutdown_signal).await?;

    info!("Shutdown complete");
    Ok(())
}
