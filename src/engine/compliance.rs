use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

/// Thai long-stay rules for a listing: 30+ night minimum, a chanote on file,
/// and juristic person approval for condo units.
pub fn check_compliance(record: &PropertyCompliance, now: DateTime<Utc>) -> ComplianceReport {
    let mut issues = Vec::new();
    if record.minimum_stay_days < MIN_STAY_DAYS {
        issues.push(ComplianceIssue::MinimumStayTooShort {
            minimum_stay_days: record.minimum_stay_days,
        });
    }
    if record.chanote_title.as_deref().is_none_or(|t| t.trim().is_empty()) {
        issues.push(ComplianceIssue::MissingChanoteTitle);
    }
    if record.property_type == PropertyType::Condo && !record.juristic_person_approval {
        issues.push(ComplianceIssue::MissingJuristicApproval);
    }

    ComplianceReport {
        property_id: record.property_id.clone(),
        compliant: issues.is_empty(),
        issues,
        checked_at: now,
    }
}

impl Engine {
    /// Insert or replace a property's compliance record. Any earlier check
    /// result is discarded.
    pub fn register_property(&self, mut record: PropertyCompliance) -> Result<(), EngineError> {
        super::mutations::validate_property_id(&record.property_id).map_err(|e| self.fail(e))?;
        record.compliance_check = None;
        info!("registered property {} ({:?})", record.property_id, record.property_type);
        self.store.upsert_property(record);
        Ok(())
    }

    pub fn property_compliance(&self, property_id: &str) -> Result<PropertyCompliance, EngineError> {
        self.store
            .get_property(property_id)
            .ok_or_else(|| self.fail(EngineError::PropertyNotFound(property_id.to_string())))
    }

    /// Run the compliance check and remember the outcome on the record.
    pub fn validate_compliance(&self, property_id: &str) -> Result<ComplianceReport, EngineError> {
        let record = self.property_compliance(property_id)?;
        let report = check_compliance(&record, self.clock().now());
        if !self.store.set_compliance_check(property_id, report.compliant) {
            return Err(self.fail(EngineError::PropertyNotFound(property_id.to_string())));
        }
        if report.compliant {
            info!("property {property_id} passed compliance check");
        } else {
            warn!("property {property_id} failed compliance check: {} issue(s)", report.issues.len());
        }
        Ok(report)
    }
}
