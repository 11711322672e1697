mod calendar;
mod compliance;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod refund;
mod store;
#[cfg(test)]
mod tests;

pub use calendar::{AvailabilityCalendar, PropertyCalendar, SharedCalendar};
pub use compliance::check_compliance;
pub use error::EngineError;
pub use lifecycle::{next_status, releases_dates};
pub use refund::{days_until_checkin, refund_amount, refund_fraction};
pub use store::{InMemoryStore, SharedBooking};

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::observability::{BOOKING_TRANSITIONS_TOTAL, ENGINE_ERRORS_TOTAL};

/// Owns every booking and every property calendar. All mutation of either goes
/// through this type.
pub struct Engine {
    pub(crate) store: InMemoryStore,
    pub(crate) calendar: AvailabilityCalendar,
    pub notify: Arc<NotifyHub>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings, clock: Arc<dyn Clock>, notify: Arc<NotifyHub>) -> Self {
        Self {
            store: InMemoryStore::new(),
            calendar: AvailabilityCalendar::new(),
            notify,
            clock,
            settings,
        }
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Count an error by kind and hand it back.
    pub(crate) fn fail(&self, err: EngineError) -> EngineError {
        metrics::counter!(ENGINE_ERRORS_TOTAL, "kind" => err.kind()).increment(1);
        err
    }

    /// Lookup booking, acquire its lock.
    pub(crate) async fn lock_booking(&self, id: &BookingId) -> Result<OwnedMutexGuard<Booking>, EngineError> {
        let shared = self
            .store
            .get_booking(id)
            .ok_or_else(|| self.fail(EngineError::NotFound(*id)))?;
        Ok(shared.lock_owned().await)
    }

    /// Validate and apply one state-machine step on a locked booking. Frees the
    /// booking's nights when the transition ends the stay early.
    ///
    /// Lock order is booking → calendar. Creation only takes the calendar lock,
    /// so the order never inverts.
    pub(crate) async fn apply_transition(
        &self,
        booking: &mut Booking,
        transition: Transition,
    ) -> Result<(), EngineError> {
        let to = next_status(booking.status, transition).map_err(|e| self.fail(e))?;
        if releases_dates(transition) {
            let mut cal = self.calendar.lock(&booking.property_id).await;
            cal.release_owned(&booking.span(), Occupant::Booking(booking.booking_id));
        }
        booking.status = to;
        metrics::counter!(BOOKING_TRANSITIONS_TOTAL, "transition" => transition.as_str()).increment(1);
        Ok(())
    }
}
