//! Field rules shared by the service layer and snapshot import.

use crate::dto::NewIncident;
use crate::entity::{AccidentCause, IamItem, Incident};
use crate::error::ValidationErrors;
use chrono::NaiveDate;

pub const MIN_INCIDENT_NAME_CHARS: usize = 5;
pub const MAX_PROGRESS: u8 = 100;

/// Incident values subject to validation, borrowed from a request or a stored incident.
#[derive(Debug, Clone, Copy)]
pub struct IncidentFields<'a> {
    pub incident_name: &'a str,
    pub incident_date: Option<NaiveDate>,
    pub discovery_date: Option<NaiveDate>,
    pub business_unit: &'a str,
    pub cause_of_accident: Option<AccidentCause>,
    pub potential_loss: f64,
    pub recovery: f64,
}

impl<'a> From<&'a NewIncident> for IncidentFields<'a> {
    fn from(new: &'a NewIncident) -> Self {
        Self {
            incident_name: &new.incident_name,
            incident_date: new.incident_date,
            discovery_date: new.discovery_date,
            business_unit: &new.business_unit,
            cause_of_accident: new.cause_of_accident,
            potential_loss: new.potential_loss,
            recovery: new.recovery,
        }
    }
}

impl<'a> From<&'a Incident> for IncidentFields<'a> {
    fn from(incident: &'a Incident) -> Self {
        Self {
            incident_name: &incident.incident_name,
            incident_date: Some(incident.incident_date),
            discovery_date: Some(incident.discovery_date),
            business_unit: &incident.business_unit,
            cause_of_accident: Some(incident.cause_of_accident),
            potential_loss: incident.potential_loss,
            recovery: incident.recovery,
        }
    }
}

/// Check every incident field and report all failures at once.
///
/// On success returns the required dates and cause, which are then known to be present.
pub fn validate_incident(
    fields: &IncidentFields<'_>,
) -> Result<(NaiveDate, NaiveDate, AccidentCause), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if fields.incident_name.trim().chars().count() < MIN_INCIDENT_NAME_CHARS {
        errors.add(
            "incidentName",
            format!("must be at least {} characters", MIN_INCIDENT_NAME_CHARS),
        );
    }
    if fields.incident_date.is_none() {
        errors.add("incidentDate", "is required");
    }
    if fields.discovery_date.is_none() {
        errors.add("discoveryDate", "is required");
    }
    if let (Some(incident), Some(discovery)) = (fields.incident_date, fields.discovery_date) {
        if discovery < incident {
            errors.add("discoveryDate", "must not be earlier than the incident date");
        }
    }
    if fields.business_unit.trim().is_empty() {
        errors.add("businessUnit", "is required");
    }
    if fields.cause_of_accident.is_none() {
        errors.add("causeOfAccident", "is required");
    }
    check_amount(&mut errors, "potentialLoss", fields.potential_loss);
    check_amount(&mut errors, "recovery", fields.recovery);

    match (fields.incident_date, fields.discovery_date, fields.cause_of_accident) {
        (Some(incident), Some(discovery), Some(cause)) if errors.is_empty() => {
            Ok((incident, discovery, cause))
        }
        _ => Err(errors),
    }
}

fn check_amount(errors: &mut ValidationErrors, field: &str, value: f64) {
    if !value.is_finite() {
        errors.add(field, "must be a number");
    } else if value < 0.0 {
        errors.add(field, "must not be negative");
    }
}

/// Stored IAM items need an issue and a progress within 0..=100.
pub fn validate_iam_item(item: &IamItem) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if item.issue.trim().is_empty() {
        errors.add("issue", "is required");
    }
    if item.progress > MAX_PROGRESS {
        errors.add("progress", format!("must be at most {}", MAX_PROGRESS));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields<'a>(name: &'a str, unit: &'a str) -> IncidentFields<'a> {
        IncidentFields {
            incident_name: name,
            incident_date: NaiveDate::from_ymd_opt(2024, 3, 10),
            discovery_date: NaiveDate::from_ymd_opt(2024, 3, 12),
            business_unit: unit,
            cause_of_accident: Some(AccidentCause::Process),
            potential_loss: 1000.0,
            recovery: 0.0,
        }
    }

    #[test]
    fn valid_fields_yield_dates_and_cause() {
        let (incident, discovery, cause) =
            validate_incident(&fields("Wire transfer error", "Operations")).unwrap();
        assert!(discovery > incident);
        assert_eq!(cause, AccidentCause::Process);
    }

    #[test]
    fn iam_progress_above_hundred_is_invalid() {
        let mut item: IamItem = serde_json::from_value(serde_json::json!({
            "id": "1",
            "issue": "Rotate shared credentials",
            "progress": 100,
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(validate_iam_item(&item).is_ok());
        item.progress = 101;
        let errors = validate_iam_item(&item).unwrap_err();
        assert!(errors.contains("progress"));
        assert!(!errors.contains("issue"));
    }
}
