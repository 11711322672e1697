use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::model::*;

use super::EngineError;

pub type SharedCalendar = Arc<RwLock<PropertyCalendar>>;

/// Day-granular occupancy of one property. A date maps to at most one
/// occupant; a missing date is free.
#[derive(Debug, Clone, Default)]
pub struct PropertyCalendar {
    days: BTreeMap<NaiveDate, Occupant>,
    holds: HashMap<Ulid, ManualHold>,
}

impl PropertyCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// First occupied date inside `span`, if any.
    pub fn first_conflict(&self, span: &DateSpan) -> Option<(NaiveDate, Occupant)> {
        if span.is_empty() {
            return None;
        }
        self.days
            .range(span.start..span.end)
            .next()
            .map(|(date, occupant)| (*date, *occupant))
    }

    pub fn is_available(&self, span: &DateSpan) -> bool {
        self.first_conflict(span).is_none()
    }

    /// Write `occupant` into every date of `span`. Overwrites; callers check first.
    pub fn block(&mut self, span: &DateSpan, occupant: Occupant) {
        for date in span.days() {
            self.days.insert(date, occupant);
        }
    }

    /// Free every date of `span`. Returns how many dates were occupied.
    pub fn release(&mut self, span: &DateSpan) -> usize {
        if span.is_empty() {
            return 0;
        }
        let dates: Vec<NaiveDate> = self.days.range(span.start..span.end).map(|(d, _)| *d).collect();
        for date in &dates {
            self.days.remove(date);
        }
        dates.len()
    }

    /// Free only the dates of `span` still held by `occupant`.
    pub fn release_owned(&mut self, span: &DateSpan, occupant: Occupant) -> usize {
        if span.is_empty() {
            return 0;
        }
        let dates: Vec<NaiveDate> = self
            .days
            .range(span.start..span.end)
            .filter(|(_, o)| **o == occupant)
            .map(|(d, _)| *d)
            .collect();
        for date in &dates {
            self.days.remove(date);
        }
        dates.len()
    }

    /// Check and block in one step.
    pub fn try_block(
        &mut self,
        property_id: &str,
        span: &DateSpan,
        occupant: Occupant,
    ) -> Result<(), EngineError> {
        if let Some((date, _)) = self.first_conflict(span) {
            return Err(EngineError::AvailabilityConflict {
                property_id: property_id.to_string(),
                date,
            });
        }
        self.block(span, occupant);
        Ok(())
    }

    pub fn occupant_on(&self, date: NaiveDate) -> Option<Occupant> {
        self.days.get(&date).copied()
    }

    pub fn occupied_days(&self) -> usize {
        self.days.len()
    }

    pub fn insert_hold(&mut self, hold: ManualHold) {
        self.holds.insert(hold.hold_id, hold);
    }

    pub fn remove_hold(&mut self, hold_id: &Ulid) -> Option<ManualHold> {
        self.holds.remove(hold_id)
    }

    pub fn holds(&self) -> impl Iterator<Item = &ManualHold> {
        self.holds.values()
    }
}

/// Calendars for every property, each behind its own lock so writers on
/// different properties never contend.
#[derive(Default)]
pub struct AvailabilityCalendar {
    properties: DashMap<PropertyId, SharedCalendar>,
}

impl AvailabilityCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, property_id: &str) -> Option<SharedCalendar> {
        self.properties.get(property_id).map(|e| e.value().clone())
    }

    pub fn get_or_create(&self, property_id: &str) -> SharedCalendar {
        if let Some(existing) = self.get(property_id) {
            return existing;
        }
        self.properties
            .entry(property_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(PropertyCalendar::new())))
            .value()
            .clone()
    }

    /// Exclusive access to one property's calendar. Hold the guard across any
    /// check-then-block sequence.
    pub async fn lock(&self, property_id: &str) -> OwnedRwLockWriteGuard<PropertyCalendar> {
        self.get_or_create(property_id).write_owned().await
    }

    /// True iff no date in `[check_in, check_out)` is occupied. Unknown
    /// properties are fully available.
    pub async fn check_availability(&self, property_id: &str, check_in: NaiveDate, check_out: NaiveDate) -> bool {
        let Some(cal) = self.get(property_id) else {
            return true;
        };
        let guard = cal.read().await;
        guard.is_available(&DateSpan::new(check_in, check_out))
    }

    pub async fn block_dates(&self, property_id: &str, check_in: NaiveDate, check_out: NaiveDate, booking_id: BookingId) {
        let mut guard = self.lock(property_id).await;
        guard.block(&DateSpan::new(check_in, check_out), Occupant::Booking(booking_id));
    }

    /// Idempotent: dates that are already free are skipped.
    pub async fn release_dates(&self, property_id: &str, check_in: NaiveDate, check_out: NaiveDate) {
        let Some(cal) = self.get(property_id) else {
            return;
        };
        let mut guard = cal.write().await;
        guard.release(&DateSpan::new(check_in, check_out));
    }

    /// Atomic check-and-block for one property.
    pub async fn try_block(&self, property_id: &str, span: &DateSpan, occupant: Occupant) -> Result<(), EngineError> {
        let mut guard = self.lock(property_id).await;
        guard.try_block(property_id, span, occupant)
    }
}
