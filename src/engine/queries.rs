use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::warn;

use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let booking = self.lock_booking(&id).await?;
        Ok(booking.clone())
    }

    /// Every booking ever made on the property, ordered by check-in.
    pub async fn bookings_for_property(&self, property_id: &str) -> Vec<Booking> {
        let mut out = Vec::new();
        for shared in self.store.bookings_for_property(property_id) {
            out.push(shared.lock().await.clone());
        }
        out.sort_by_key(|b| (b.details.check_in(), b.created_at));
        out
    }

    pub async fn check_availability(&self, property_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        self.calendar.check_availability(property_id, check_in, check_out).await
    }

    pub async fn holds_for_property(&self, property_id: &str) -> Vec<ManualHold> {
        let Some(cal) = self.calendar.get(property_id) else {
            return Vec::new();
        };
        let guard = cal.read().await;
        let mut holds: Vec<ManualHold> = guard.holds().cloned().collect();
        holds.sort_by_key(|h| h.span.start);
        holds
    }

    /// Confirmed bookings whose check-in is more than the grace period before `today`.
    pub async fn collect_no_shows(&self, today: NaiveDate) -> Vec<BookingId> {
        let grace = self.settings().no_show_grace_days;
        let Some(cutoff) = Duration::try_days(grace).and_then(|g| today.checked_sub_signed(g)) else {
            warn!("no-show grace of {grace} days is out of range, skipping sweep");
            return Vec::new();
        };
        let mut due = Vec::new();
        for shared in self.store.all_bookings() {
            let booking = shared.lock().await;
            if booking.status == BookingStatus::Confirmed && booking.details.check_in() < cutoff {
                due.push(booking.booking_id);
            }
        }
        due
    }

    pub async fn get_booking_analytics(&self) -> BookingAnalytics {
        let mut by_status: BTreeMap<BookingStatus, usize> =
            BookingStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut total_revenue = Decimal::ZERO;
        let mut total_days: i64 = 0;

        let bookings = self.store.all_bookings();
        let total_bookings = bookings.len();
        for shared in bookings {
            let booking = shared.lock().await;
            *by_status.entry(booking.status).or_default() += 1;
            if booking.status != BookingStatus::Cancelled {
                total_revenue = total_revenue.saturating_add(booking.pricing.total_amount());
            }
            total_days += booking.details.stay_duration_days();
        }

        let confirmed_bookings = by_status.get(&BookingStatus::Confirmed).copied().unwrap_or(0);
        let total_floor = total_bookings.max(1);
        let confirmed_floor = confirmed_bookings.max(1);

        BookingAnalytics {
            total_bookings,
            by_status,
            confirmed_bookings,
            confirmation_rate: confirmed_bookings as f64 / total_floor as f64,
            total_revenue,
            average_booking_value: (total_revenue / Decimal::from(confirmed_floor as u64)).round_dp(2),
            average_stay_duration: total_days as f64 / total_floor as f64,
        }
    }
}
