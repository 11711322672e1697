use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{AVAILABILITY_CONFLICTS_TOTAL, BOOKINGS_CREATED_TOTAL, REFUND_AMOUNT};

use super::refund::{days_until_checkin, refund_amount};
use super::{next_status, Engine, EngineError};

pub(super) fn validate_property_id(property_id: &str) -> Result<(), EngineError> {
    if property_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("property_id is empty"));
    }
    if property_id.len() > MAX_PROPERTY_ID_LEN {
        return Err(EngineError::LimitExceeded("property_id too long"));
    }
    Ok(())
}

impl Engine {
    /// Reserve `details.span()` on `property_id` for `guest`. The availability
    /// check and the calendar write happen under one property lock.
    pub async fn create_booking(
        &self,
        property_id: &str,
        guest: GuestProfile,
        details: BookingDetails,
        pricing: PricingBreakdown,
    ) -> Result<Booking, EngineError> {
        validate_property_id(property_id).map_err(|e| self.fail(e))?;
        guest.validate().map_err(|e| self.fail(e))?;

        let nights = details.stay_duration_days();
        if nights < MIN_STAY_DAYS {
            return Err(self.fail(EngineError::ComplianceViolation(format!(
                "minimum stay is {MIN_STAY_DAYS} days for legal compliance, requested {nights}"
            ))));
        }

        let booking_id = Ulid::new();
        let span = details.span();

        let mut cal = self.calendar.lock(property_id).await;
        if let Err(e) = cal.try_block(property_id, &span, Occupant::Booking(booking_id)) {
            warn!("booking rejected on {property_id} for {span}: {e}");
            metrics::counter!(AVAILABILITY_CONFLICTS_TOTAL).increment(1);
            return Err(self.fail(e));
        }
        let booking = Booking::new(
            booking_id,
            property_id.to_string(),
            guest,
            details,
            pricing,
            self.clock().now(),
        );
        self.store.insert_booking(booking.clone());
        drop(cal);

        metrics::counter!(BOOKINGS_CREATED_TOTAL).increment(1);
        self.notify.send(
            property_id,
            &BookingEvent::Created {
                booking_id,
                property_id: property_id.to_string(),
                span,
            },
        );
        info!("created booking {booking_id} for property {property_id} {span}");
        Ok(booking)
    }

    pub async fn confirm_booking(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        next_status(booking.status, Transition::Confirm).map_err(|e| self.fail(e))?;
        if self.settings().require_deposit_before_confirm && !booking.deposit_paid {
            return Err(self.fail(EngineError::PaymentRequired(id)));
        }

        self.apply_transition(&mut booking, Transition::Confirm).await?;
        booking.confirmed_at = Some(self.clock().now());
        booking.confirmation_sent = true;

        self.notify.send(&booking.property_id, &BookingEvent::Confirmed { booking_id: id });
        info!("confirmed booking {id}");
        Ok(booking.clone())
    }

    /// Cancel and compute the refund against the engine clock's today. The
    /// booking's nights go back to the calendar.
    pub async fn cancel_booking(&self, id: BookingId, reason: &str) -> Result<CancellationOutcome, EngineError> {
        if reason.len() > MAX_REASON_LEN {
            return Err(self.fail(EngineError::LimitExceeded("cancellation reason too long")));
        }
        let mut booking = self.lock_booking(&id).await?;

        let days = days_until_checkin(booking.details.check_in(), self.clock().today());
        let refund = refund_amount(days, booking.pricing.total_amount());

        self.apply_transition(&mut booking, Transition::Cancel).await?;
        let cancelled_at = self.clock().now();
        booking.cancelled_at = Some(cancelled_at);
        booking.cancellation_reason = Some(reason.to_string());

        metrics::histogram!(REFUND_AMOUNT).record(refund.to_f64().unwrap_or_default());
        self.notify.send(
            &booking.property_id,
            &BookingEvent::Cancelled {
                booking_id: id,
                refund_amount: refund,
                reason: reason.to_string(),
            },
        );
        info!("cancelled booking {id} ({days} days before check-in), refund: {refund}");

        Ok(CancellationOutcome {
            booking_id: id,
            cancelled_at,
            days_until_checkin: days,
            refund_amount: refund,
            reason: reason.to_string(),
        })
    }

    /// Front-desk arrival. Marks the TM30 report as filed with the address
    /// from `data`, falling back to the guest profile.
    pub async fn check_in_guest(&self, id: BookingId, data: CheckInData) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        self.apply_transition(&mut booking, Transition::CheckIn).await?;

        booking.checked_in_at = Some(data.arrived_at.unwrap_or_else(|| self.clock().now()));
        let address = data.tm30_address.or_else(|| booking.guest.thai_address.clone());
        booking.tm30_address = address;
        booking.tm30_filed = true;
        booking.check_in_instructions_sent = true;
        if booking.guest.is_foreign() && booking.tm30_address.is_none() {
            warn!("booking {id}: TM30 filed for foreign guest without an address");
        }

        self.notify.send(
            &booking.property_id,
            &BookingEvent::CheckedIn {
                booking_id: id,
                tm30_filed: booking.tm30_filed,
            },
        );
        info!("checked in guest for booking {id}");
        Ok(booking.clone())
    }

    pub async fn check_out_guest(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        self.apply_transition(&mut booking, Transition::CheckOut).await?;
        booking.checked_out_at = Some(self.clock().now());

        self.notify.send(&booking.property_id, &BookingEvent::CheckedOut { booking_id: id });
        info!("checked out booking {id}");
        Ok(booking.clone())
    }

    /// Guest never arrived. Frees the remaining nights.
    pub async fn mark_no_show(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        self.apply_transition(&mut booking, Transition::NoShow).await?;

        self.notify.send(&booking.property_id, &BookingEvent::NoShow { booking_id: id });
        info!("booking {id} marked no-show");
        Ok(booking.clone())
    }

    /// Record that the deposit cleared. The booking is fully paid when the
    /// deposit covers the whole amount.
    pub async fn record_deposit(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(self.fail(EngineError::InvalidInput("booking is not awaiting payment")));
        }
        booking.deposit_paid = true;
        booking.payment_status = if booking.pricing.balance_due().is_zero() {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        info!("deposit recorded for booking {id}");
        Ok(booking.clone())
    }

    pub async fn sign_contract(&self, id: BookingId) -> Result<Booking, EngineError> {
        let mut booking = self.lock_booking(&id).await?;
        if booking.status.is_terminal() {
            return Err(self.fail(EngineError::InvalidInput("booking is closed")));
        }
        booking.contract_signed = true;
        info!("lease contract signed for booking {id}");
        Ok(booking.clone())
    }

    /// Owner block (maintenance, personal use). Same exclusivity rules as a booking.
    pub async fn hold_dates(
        &self,
        property_id: &str,
        span: DateSpan,
        reason: Option<String>,
    ) -> Result<ManualHold, EngineError> {
        validate_property_id(property_id).map_err(|e| self.fail(e))?;
        if span.is_empty() {
            return Err(self.fail(EngineError::InvalidInput("hold must cover at least one night")));
        }
        if let Some(ref r) = reason
            && r.len() > MAX_REASON_LEN
        {
            return Err(self.fail(EngineError::LimitExceeded("hold reason too long")));
        }

        let hold_id = Ulid::new();
        let mut cal = self.calendar.lock(property_id).await;
        if let Err(e) = cal.try_block(property_id, &span, Occupant::Hold(hold_id)) {
            metrics::counter!(AVAILABILITY_CONFLICTS_TOTAL).increment(1);
            return Err(self.fail(e));
        }
        let hold = ManualHold { hold_id, span, reason };
        cal.insert_hold(hold.clone());
        drop(cal);

        self.notify.send(
            property_id,
            &BookingEvent::DatesHeld {
                hold_id,
                property_id: property_id.to_string(),
                span,
            },
        );
        info!("held {span} on property {property_id} ({hold_id})");
        Ok(hold)
    }

    pub async fn release_hold(&self, property_id: &str, hold_id: Ulid) -> Result<ManualHold, EngineError> {
        let cal = self
            .calendar
            .get(property_id)
            .ok_or_else(|| self.fail(EngineError::NotFound(hold_id)))?;
        let mut cal = cal.write().await;
        let hold = cal
            .remove_hold(&hold_id)
            .ok_or_else(|| self.fail(EngineError::NotFound(hold_id)))?;
        cal.release_owned(&hold.span, Occupant::Hold(hold_id));
        drop(cal);

        self.notify.send(
            property_id,
            &BookingEvent::HoldReleased {
                hold_id,
                property_id: property_id.to_string(),
            },
        );
        info!("released hold {hold_id} on property {property_id}");
        Ok(hold)
    }
}
