use anyhow::Context;
use roundspin::engine::{Clock, SystemClock};
use roundspin::orchestration::{Accounts, BidGateway, RoundDriver, RoundLedger, RoundTimer};
use roundspin::publish::{EventHub, Publisher};
use roundspin::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("initializing database at {}", config.database_path))?;
    let repo = Arc::new(Repository::new(pool));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let events = EventHub::default();
    let publisher: Arc<dyn Publisher> = Arc::new(events.clone());

    let driver = RoundDriver::new(
        RoundLedger::new(repo.clone(), config.default_return_multiplier),
        clock.clone(),
        config.timeline,
    );
    let timer = RoundTimer::new(
        driver,
        publisher.clone(),
        Duration::from_millis(config.tick_interval_ms),
    );
    let timer_handle = timer.handle();
    let timer_task = timer.start().context("round timer failed to start")?;

    let gateway = Arc::new(BidGateway::new(repo.clone(), publisher.clone(), clock.clone()));
    let accounts = Arc::new(Accounts::new(
        repo.clone(),
        publisher,
        clock.clone(),
        config.starting_coins,
    ));

    let app = api::create_router(api::AppState::new(
        repo,
        config,
        gateway,
        accounts,
        timer_handle.clone(),
        events,
        clock,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    timer_handle.shutdown().await;
    if let Err(err) = timer_task.await {
        tracing::error!(error = %err, "round timer task ended abnormally");
    }
    Ok(())
}
