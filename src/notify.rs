use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::model::{BookingEvent, PropertyId};

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub for booking lifecycle events, one channel per property.
/// Email/LINE dispatchers and the TM30 filer subscribe here.
pub struct NotifyHub {
    channels: DashMap<PropertyId, broadcast::Sender<BookingEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to events for a property. Creates the channel if needed.
    pub fn subscribe(&self, property_id: &str) -> broadcast::Receiver<BookingEvent> {
        let sender = self
            .channels
            .entry(property_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send an event. No-op if nobody is listening.
    pub fn send(&self, property_id: &str, event: &BookingEvent) {
        if let Some(sender) = self.channels.get(property_id) {
            let _ = sender.send(event.clone());
        }
    }

    pub fn remove(&self, property_id: &str) {
        self.channels.remove(property_id);
    }
}
