use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use booking_intake::build_router;
use booking_intake::config::Args;
use booking_intake::forwarder::SheetsForwarder;
use booking_intake::rate_limit::{RateLimiter, ledger_sweeper};
use booking_intake::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    args.validate()?;

    let limits = args.rate_limit_config();
    let limiter = Arc::new(RateLimiter::new(limits.clone()));
    let forwarder = SheetsForwarder::new(args.forwarder_config())?;

    // spawn the ledger sweeper
    tokio::spawn(ledger_sweeper(Arc::clone(&limiter), args.sweep_interval()));

    let state = AppState::new(limiter, forwarder);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(args.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;

    info!("Booking intake listening on http://{}", listener.local_addr()?);
    info!("Forwarding bookings to {} (timeout {}s)", args.webhook_url, args.webhook_timeout);
    info!(
        "Rate limits: {} per IP per {}s, {} per email per {}s, {}s email cooldown",
        limits.ip_limit,
        limits.ip_window.as_secs(),
        limits.email_limit,
        limits.email_window.as_secs(),
        limits.email_cooldown.as_secs()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Booking intake stopped");
    Ok(())
}

// Resolves on CTRL+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    warn!("Shutdown signal received, draining in-flight requests");
}
