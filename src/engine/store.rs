use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::model::*;

pub type SharedBooking = Arc<Mutex<Booking>>;

/// In-process booking collection. Stands in for the persistence layer:
/// records are never deleted, only moved to a terminal status.
pub struct InMemoryStore {
    bookings: DashMap<BookingId, SharedBooking>,
    /// Property → bookings index, in creation order.
    by_property: DashMap<PropertyId, Vec<BookingId>>,
    properties: DashMap<PropertyId, PropertyCompliance>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            bookings: DashMap::new(),
            by_property: DashMap::new(),
            properties: DashMap::new(),
        }
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn contains_booking(&self, id: &BookingId) -> bool {
        self.bookings.contains_key(id)
    }

    pub fn get_booking(&self, id: &BookingId) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    pub fn insert_booking(&self, booking: Booking) -> SharedBooking {
        let id = booking.booking_id;
        let property_id = booking.property_id.clone();
        let shared = Arc::new(Mutex::new(booking));
        self.bookings.insert(id, shared.clone());
        self.by_property.entry(property_id).or_default().push(id);
        shared
    }

    /// Snapshot of every booking handle. Collected up front so no map shard
    /// stays locked while callers await the per-booking mutex.
    pub fn all_bookings(&self) -> Vec<SharedBooking> {
        self.bookings.iter().map(|e| e.value().clone()).collect()
    }

    pub fn booking_ids_for_property(&self, property_id: &str) -> Vec<BookingId> {
        self.by_property
            .get(property_id)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn bookings_for_property(&self, property_id: &str) -> Vec<SharedBooking> {
        self.booking_ids_for_property(property_id)
            .iter()
            .filter_map(|id| self.get_booking(id))
            .collect()
    }

    /// Insert or replace a property's compliance record.
    pub fn upsert_property(&self, record: PropertyCompliance) {
        self.properties.insert(record.property_id.clone(), record);
    }

    pub fn get_property(&self, property_id: &str) -> Option<PropertyCompliance> {
        self.properties.get(property_id).map(|e| e.value().clone())
    }

    /// Store the outcome of a compliance check. False if the property is unknown.
    pub fn set_compliance_check(&self, property_id: &str, compliant: bool) -> bool {
        match self.properties.get_mut(property_id) {
            Some(mut record) => {
                record.compliance_check = Some(compliant);
                true
            }
            None => false,
        }
    }
}
