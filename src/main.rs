use mimalloc::MiMalloc;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use stockcast::auth::session::session_key;
use stockcast::PredictorHandle;
use stockcast::config::CONFIG;
use stockcast::router::{StockcastState, stockcast_router};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = &*CONFIG;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        model_path = %cfg.model_path.display(),
        market_data_url = %cfg.market_data_url,
        proxy = %cfg.proxy.as_ref().map(|u| u.as_str()).unwrap_or("<none>"),
        window = cfg.window,
        train_ratio = cfg.train_ratio,
        loglevel = %cfg.loglevel
    );

    let users = stockcast::db::connect(&cfg.database_url).await?;
    let market = stockcast::YahooFinance::new(
        cfg.market_data_url.clone(),
        cfg.proxy.as_ref(),
        cfg.market_rate_per_minute,
    )?;
    let predictor = stockcast::forecast::actor::spawn(cfg.model_path.clone()).await?;
    spawn_reload_on_hangup(predictor.clone());

    let state = StockcastState::new(
        users,
        Arc::new(market),
        predictor,
        session_key(&cfg.secret_key),
    )
    .with_pipeline(cfg.pipeline())
    .with_password_iterations(cfg.password_iterations)
    .with_insecure_cookie(cfg.insecure_cookie);
    let app = stockcast_router(state);

    let listener = TcpListener::bind(cfg.listen_addr.as_str()).await?;
    info!("HTTP server listening on {}", cfg.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// SIGHUP drops the cached model so a replaced model file is picked up.
#[cfg(unix)]
fn spawn_reload_on_hangup(predictor: PredictorHandle) {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable; model reload disabled");
            return;
        }
    };
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            info!("SIGHUP received; reloading model");
            predictor.reload();
        }
    });
}

#[cfg(not(unix))]
fn spawn_reload_on_hangup(_predictor: PredictorHandle) {}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
