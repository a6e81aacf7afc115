//! Stored entities: incidents, IAM items, users, registrations and business units.

use crate::lifecycle::{OperationalStatus, ReviewEvent, ReviewStatus};
use crate::error::ValidationErrors;
use crate::traits::{Collection, Record};
use crate::validate::{validate_iam_item, validate_incident, IncidentFields};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// User role. Capabilities increase from Inputter to Administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Inputter,
    Approver,
    Administrator,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Inputter => write!(f, "Inputter"),
            Role::Approver => write!(f, "Approver"),
            Role::Administrator => write!(f, "Administrator"),
        }
    }
}

/// Categorical cause of an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccidentCause {
    People,
    Process,
    System,
    #[serde(rename = "External Factors", alias = "ExternalFactors")]
    ExternalFactors,
}

impl std::fmt::Display for AccidentCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccidentCause::People => write!(f, "People"),
            AccidentCause::Process => write!(f, "Process"),
            AccidentCause::System => write!(f, "System"),
            AccidentCause::ExternalFactors => write!(f, "External Factors"),
        }
    }
}

/// Which parties were involved in an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvolvedParties {
    Internal,
    External,
    Both,
}

/// Identity snapshot of a person, frozen at the moment it is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSnapshot {
    pub name: String,
    pub employee_id: String,
    pub position: String,
}

impl From<&User> for PersonSnapshot {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            employee_id: user.employee_id.clone(),
            position: user.position.clone(),
        }
    }
}

/// A recorded risk/loss event under review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: String,
    pub incident_name: String,
    pub incident_date: NaiveDate,
    /// Never earlier than `incident_date`.
    pub discovery_date: NaiveDate,
    /// Business unit name (string reference, not enforced).
    pub business_unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub root_cause: String,
    pub cause_of_accident: AccidentCause,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub involved_parties: Option<InvolvedParties>,
    pub potential_loss: f64,
    pub recovery: f64,
    /// Always `potential_loss - recovery`; see [`Incident::recompute_actual_loss`].
    pub actual_loss: f64,
    #[serde(default)]
    pub recovery_source: String,
    pub status: OperationalStatus,
    pub review_status: ReviewStatus,
    /// Creator identity at creation time. Never rewritten.
    pub created_by: PersonSnapshot,
    #[serde(default)]
    pub review_history: Vec<ReviewEvent>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Incident {
    pub fn recompute_actual_loss(&mut self) {
        self.actual_loss = self.potential_loss - self.recovery;
    }

    pub fn is_open(&self) -> bool {
        self.status == OperationalStatus::Open
    }

    /// Stamp `updated_at` with the current time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Record for Incident {
    const COLLECTION: Collection = Collection::Incidents;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_incident(&IncidentFields::from(self)).map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Remediation item status. Caller-set; `Overdue` is never derived from the target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IamStatus {
    #[default]
    Pending,
    #[serde(rename = "In Progress", alias = "InProgress")]
    InProgress,
    Completed,
    Overdue,
}

/// Issue and Action Management item: a remediation task, optionally linked to an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamItem {
    pub id: String,
    #[serde(
        default,
        alias = "relatedIncidentId",
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub incident_id: Option<String>,
    #[serde(alias = "title")]
    pub issue: String,
    #[serde(default)]
    pub root_cause: String,
    #[serde(default, alias = "description")]
    pub action_plan: String,
    #[serde(default, alias = "dueDate", skip_serializing_if = "Option::is_none")]
    pub target_date: Option<NaiveDate>,
    #[serde(default, alias = "assignedTo")]
    pub pic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub status: IamStatus,
    /// Percentage in 0..=100.
    #[serde(default)]
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for IamItem {
    const COLLECTION: Collection = Collection::IamItems;

    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_iam_item(self)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v: Option<String> = Option::deserialize(deserializer)?;
    Ok(v.filter(|s| !s.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    /// Human-facing login key; unique across users.
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
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for User {
    const COLLECTION: Collection = Collection::Users;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegistrationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// Self-service account application, reviewed by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegistration {
    pub id: String,
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
    #[serde(default)]
    pub status: RegistrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for UserRegistration {
    const COLLECTION: Collection = Collection::UserRegistrations;

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessUnit {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for BusinessUnit {
    const COLLECTION: Collection = Collection::BusinessUnits;

    fn id(&self) -> &str {
        &self.id
    }
}
