use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use siamstay::clock::SystemClock;
use siamstay::config::Config;
use siamstay::engine::Engine;
use siamstay::notify::NotifyHub;
use siamstay::payment::PaymentService;
use siamstay::sweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    siamstay::observability::init(config.metrics_port)?;

    let notify = Arc::new(NotifyHub::new());
    let engine = Arc::new(Engine::new(config.engine.clone(), Arc::new(SystemClock), notify));
    let payments = PaymentService::from_configs(&config.processors);

    info!("siamstay booking engine started");
    info!("  require_deposit_before_confirm: {}", config.engine.require_deposit_before_confirm);
    info!("  no_show_grace_days: {}", config.engine.no_show_grace_days);
    info!("  sweep_interval: {:?}", config.sweep_interval);
    info!("  payment processors: {:?}", config.processors);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let sweeper = tokio::spawn(sweeper::run_no_show_sweeper(engine.clone(), config.sweep_interval));

    // Graceful shutdown on SIGTERM/ctrl-c
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    info!("shutdown signal received, stopping sweeper");
    sweeper.abort();

    let bookings = engine.get_booking_analytics().await;
    let payments = payments.payment_analytics();
    info!("final booking analytics: {}", serde_json::to_string(&bookings)?);
    info!("final payment analytics: {}", serde_json::to_string(&payments)?);
    info!("siamstay stopped");
    Ok(())
}
