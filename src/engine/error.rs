use chrono::NaiveDate;
use thiserror::Error;
use ulid::Ulid;

use crate::model::{BookingStatus, PropertyId, Transition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("property not registered: {0}")]
    PropertyNotFound(PropertyId),
    #[error("compliance violation: {0}")]
    ComplianceViolation(String),
    #[error("property {property_id} is not available on {date}")]
    AvailabilityConflict { property_id: PropertyId, date: NaiveDate },
    #[error("cannot {transition} a booking that is {from}")]
    InvalidStateTransition { from: BookingStatus, transition: Transition },
    #[error("booking {0} has no deposit recorded")]
    PaymentRequired(Ulid),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
}

impl EngineError {
    /// Short, stable label for metrics and API status mapping.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "not_found",
            EngineError::PropertyNotFound(_) => "property_not_found",
            EngineError::ComplianceViolation(_) => "compliance_violation",
            EngineError::AvailabilityConflict { .. } => "availability_conflict",
            EngineError::InvalidStateTransition { .. } => "invalid_state_transition",
            EngineError::PaymentRequired(_) => "payment_required",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::LimitExceeded(_) => "limit_exceeded",
        }
    }
}
