//! Request, query and report DTOs for the service and REST layers.

use crate::entity::{
    AccidentCause, BusinessUnit, IamItem, IamStatus, Incident, InvolvedParties, Priority, Role,
    User, UserRegistration,
};
use crate::lifecycle::OperationalStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Login request (employee id only; no credential is checked).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub employee_id: String,
}

/// Fields for a new incident. `actualLoss` is derived and cannot be supplied.
///
/// Required fields are optional here so that a missing value is reported as a
/// validation failure alongside the others instead of a decode error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIncident {
    #[serde(default)]
    pub incident_name: String,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub discovery_date: Option<NaiveDate>,
    #[serde(default)]
    pub business_unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub cause_of_accident: Option<AccidentCause>,
    #[serde(default)]
    pub involved_parties: Option<InvolvedParties>,
    #[serde(default)]
    pub potential_loss: f64,
    #[serde(default)]
    pub recovery: f64,
    #[serde(default)]
    pub recovery_source: String,
    #[serde(default)]
    pub status: Option<OperationalStatus>,
}

/// Partial incident update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentPatch {
    #[serde(default)]
    pub incident_name: Option<String>,
    #[serde(default)]
    pub incident_date: Option<NaiveDate>,
    #[serde(default)]
    pub discovery_date: Option<NaiveDate>,
    #[serde(default)]
    pub business_unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub cause_of_accident: Option<AccidentCause>,
    #[serde(default)]
    pub involved_parties: Option<InvolvedParties>,
    #[serde(default)]
    pub potential_loss: Option<f64>,
    #[serde(default)]
    pub recovery: Option<f64>,
    #[serde(default)]
    pub recovery_source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: OperationalStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewComment {
    #[serde(default)]
    pub comment: Option<String>,
}

/// Incident list filter, applied after visibility.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentQuery {
    /// Calendar year of the incident date.
    #[serde(default)]
    pub year: Option<i32>,
    /// Only honoured for administrators; other roles are pinned to their department.
    #[serde(default)]
    pub business_unit: Option<String>,
    /// Case-insensitive substring of the incident name.
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIamItem {
    #[serde(default)]
    pub incident_id: Option<String>,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub action_plan: String,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
    #[serde(default)]
    pub pic: String,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamItemPatch {
    /// `Some("")` unlinks the item.
    #[serde(default)]
    pub incident_id: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
    #[serde(default)]
    pub root_cause: Option<String>,
    #[serde(default)]
    pub action_plan: Option<String>,
    /// `Some(None)` (JSON `null`) clears the date.
    #[serde(default, deserialize_with = "double_option")]
    pub target_date: Option<Option<NaiveDate>>,
    #[serde(default)]
    pub pic: Option<String>,
    /// `Some(None)` (JSON `null`) clears the priority.
    #[serde(default, deserialize_with = "double_option")]
    pub priority: Option<Option<Priority>>,
    #[serde(default)]
    pub status: Option<IamStatus>,
    /// Clamped to 0..=100.
    #[serde(default)]
    pub progress: Option<i64>,
}

/// Present-but-null becomes `Some(None)`; an absent field stays `None` through `default`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub employee_id: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    pub role: Role,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub employee_id: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRegistration {
    pub name: String,
    pub employee_id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub department: String,
    pub requested_role: Role,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusinessUnit {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessUnitPatch {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Full export document: every collection plus the export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub incidents: Vec<Incident>,
    pub iam_items: Vec<IamItem>,
    pub users: Vec<User>,
    pub user_registrations: Vec<UserRegistration>,
    pub business_units: Vec<BusinessUnit>,
    pub export_date: DateTime<Utc>,
}

/// Number of records written per collection by an import; absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incidents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iam_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_registrations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_units: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_incidents: usize,
    pub open_incidents: usize,
    pub closed_incidents: usize,
    pub pending_approvals: usize,
    pub total_potential_loss: f64,
    pub total_recovery: f64,
    pub total_actual_loss: f64,
    pub average_loss: f64,
    /// `YYYY-MM` of the incident date -> count.
    pub incidents_by_month: BTreeMap<String, usize>,
    pub incidents_by_cause: BTreeMap<String, usize>,
}
