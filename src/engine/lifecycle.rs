use crate::model::{BookingStatus, Transition};

use super::EngineError;

/// The booking state machine. Returns the status a booking in `from` moves to
/// on `transition`, or `InvalidStateTransition`. Never a silent no-op.
///
/// ```text
/// PENDING ──confirm──▶ CONFIRMED ──check_in──▶ CHECKED_IN ──check_out──▶ CHECKED_OUT
///    │                    │  └──no_show──▶ NO_SHOW            │
///    └──────cancel────────┴───────────────────────────────────┴──▶ CANCELLED
/// ```
pub fn next_status(from: BookingStatus, transition: Transition) -> Result<BookingStatus, EngineError> {
    use BookingStatus::*;

    let to = match (from, transition) {
        (Pending, Transition::Confirm) => Confirmed,
        (Confirmed, Transition::CheckIn) => CheckedIn,
        (CheckedIn, Transition::CheckOut) => CheckedOut,
        (Confirmed, Transition::NoShow) => NoShow,
        // Terminal states never move again.
        (Pending | Confirmed | CheckedIn, Transition::Cancel) => Cancelled,
        _ => return Err(EngineError::InvalidStateTransition { from, transition }),
    };
    Ok(to)
}

/// Whether `transition` gives the booking's nights back to the calendar.
pub fn releases_dates(transition: Transition) -> bool {
    matches!(transition, Transition::Cancel | Transition::NoShow)
}
