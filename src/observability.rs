use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── Booking lifecycle ───────────────────────────────────────────

/// Counter: bookings created.
pub const BOOKINGS_CREATED_TOTAL: &str = "siamstay_bookings_created_total";

/// Counter: successful status transitions. Labels: transition.
pub const BOOKING_TRANSITIONS_TOTAL: &str = "siamstay_booking_transitions_total";

/// Counter: create/hold requests rejected because the dates were taken.
pub const AVAILABILITY_CONFLICTS_TOTAL: &str = "siamstay_availability_conflicts_total";

/// Counter: engine operations that returned an error. Labels: kind.
pub const ENGINE_ERRORS_TOTAL: &str = "siamstay_engine_errors_total";

/// Histogram: refund amount per cancellation, in booking currency.
pub const REFUND_AMOUNT: &str = "siamstay_refund_amount";

/// Counter: bookings moved to NO_SHOW by the sweeper.
pub const NO_SHOWS_SWEPT_TOTAL: &str = "siamstay_no_shows_swept_total";

// ── Payments ────────────────────────────────────────────────────

/// Counter: payment transactions processed. Labels: provider.
pub const PAYMENTS_PROCESSED_TOTAL: &str = "siamstay_payments_processed_total";

/// Counter: refunds requested from a processor. Labels: provider.
pub const PAYMENT_REFUNDS_TOTAL: &str = "siamstay_payment_refunds_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
