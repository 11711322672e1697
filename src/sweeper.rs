use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::observability::NO_SHOWS_SWEPT_TOTAL;

/// Background task that periodically marks unarrived confirmed bookings as
/// no-shows and frees their dates.
pub async fn run_no_show_sweeper(engine: Arc<Engine>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        sweep_once(&engine).await;
    }
}

/// One sweep against the engine clock. Returns how many bookings were marked.
pub async fn sweep_once(engine: &Engine) -> usize {
    let today = engine.clock().today();
    let due = engine.collect_no_shows(today).await;
    let mut swept = 0;
    for booking_id in due {
        match engine.mark_no_show(booking_id).await {
            Ok(_) => {
                swept += 1;
                metrics::counter!(NO_SHOWS_SWEPT_TOTAL).increment(1);
            }
            Err(e) => {
                // Guest may have checked in or cancelled since collection.
                tracing::debug!("sweeper skip {booking_id}: {e}");
            }
        }
    }
    if swept > 0 {
        info!("swept {swept} no-show bookings");
    }
    swept
}
