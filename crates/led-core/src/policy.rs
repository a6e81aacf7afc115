//! Role-gated access policy.
//!
//! Pure functions of role, relationship to the record and review status. Nothing here is
//! cached; callers evaluate against the freshly loaded user and incident on every access.

use led_types::{Incident, ReviewStatus, Role, User};
use serde::{Deserialize, Serialize};

/// How the acting user relates to an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// The user created the incident.
    Creator,
    /// The incident belongs to the user's department.
    SameBusinessUnit,
    Unrelated,
}

impl Relationship {
    pub fn of(user: &User, incident: &Incident) -> Self {
        if incident.created_by.employee_id == user.employee_id {
            Relationship::Creator
        } else if !user.department.is_empty() && incident.business_unit == user.department {
            Relationship::SameBusinessUnit
        } else {
            Relationship::Unrelated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    /// Approve or reject at the current review level.
    pub can_approve: bool,
}

/// The incident policy table.
pub fn evaluate(role: Role, relationship: Relationship, status: ReviewStatus) -> Capabilities {
    match role {
        Role::Administrator => Capabilities {
            can_view: true,
            can_edit: true,
            can_delete: true,
            can_approve: status == ReviewStatus::PendingApprovalL2,
        },
        Role::Approver => {
            let visible = relationship != Relationship::Unrelated;
            Capabilities {
                can_view: visible,
                can_edit: false,
                can_delete: false,
                can_approve: visible && status == ReviewStatus::PendingApprovalL1,
            }
        }
        Role::Inputter => {
            let creator = relationship == Relationship::Creator;
            Capabilities {
                can_view: relationship != Relationship::Unrelated,
                can_edit: creator,
                can_delete: creator && status == ReviewStatus::Draft,
                can_approve: false,
            }
        }
    }
}

pub fn for_incident(user: &User, incident: &Incident) -> Capabilities {
    evaluate(
        user.role,
        Relationship::of(user, incident),
        incident.review_status,
    )
}

/// Actions gated by role alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateIncident,
    ManageIamItems,
    ManageUsers,
    ReviewRegistrations,
    ManageBusinessUnits,
    ExportData,
    ImportData,
    ResetData,
}

pub fn role_allows(role: Role, action: Action) -> bool {
    match action {
        Action::CreateIncident => matches!(role, Role::Inputter | Role::Administrator),
        Action::ManageIamItems | Action::ExportData => true,
        Action::ManageUsers
        | Action::ReviewRegistrations
        | Action::ManageBusinessUnits
        | Action::ImportData
        | Action::ResetData => role == Role::Administrator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::Inputter, Role::Approver, Role::Administrator];
    const RELATIONSHIPS: [Relationship; 3] = [
        Relationship::Creator,
        Relationship::SameBusinessUnit,
        Relationship::Unrelated,
    ];
    const STATUSES: [ReviewStatus; 5] = [
        ReviewStatus::Draft,
        ReviewStatus::PendingApprovalL1,
        ReviewStatus::PendingApprovalL2,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
    ];

    #[test]
    fn matrix_is_deterministic() {
        for role in ROLES {
            for rel in RELATIONSHIPS {
                for status in STATUSES {
                    let first = evaluate(role, rel, status);
                    for _ in 0..3 {
                        assert_eq!(evaluate(role, rel, status), first);
                    }
                }
            }
        }
    }

    #[test]
    fn administrator_edits_and_deletes_everything() {
        for rel in RELATIONSHIPS {
            for status in STATUSES {
                let caps = evaluate(Role::Administrator, rel, status);
                assert!(caps.can_view && caps.can_edit && caps.can_delete);
            }
        }
    }

    #[test]
    fn inputter_edits_only_own_and_deletes_only_drafts() {
        for status in STATUSES {
            let own = evaluate(Role::Inputter, Relationship::Creator, status);
            assert!(own.can_edit);
            assert_eq!(own.can_delete, status == ReviewStatus::Draft);
            assert!(!own.can_approve);

            let colleague = evaluate(Role::Inputter, Relationship::SameBusinessUnit, status);
            assert!(colleague.can_view);
            assert!(!colleague.can_edit && !colleague.can_delete);

            let other = evaluate(Role::Inputter, Relationship::Unrelated, status);
            assert!(!other.can_view);
        }
    }

    #[test]
    fn approvers_review_but_never_edit() {
        for rel in RELATIONSHIPS {
            for status in STATUSES {
                let caps = evaluate(Role::Approver, rel, status);
                assert!(!caps.can_edit && !caps.can_delete);
                assert_eq!(
                    caps.can_approve,
                    caps.can_view && status == ReviewStatus::PendingApprovalL1
                );
            }
        }
    }

    #[test]
    fn each_level_has_exactly_one_reviewer_role() {
        for status in STATUSES {
            let reviewers: Vec<Role> = ROLES
                .into_iter()
                .filter(|r| evaluate(*r, Relationship::Creator, status).can_approve)
                .collect();
            match status.approval_level() {
                Some(level) => assert_eq!(reviewers, vec![level.reviewer_role()]),
                None => assert!(reviewers.is_empty()),
            }
        }
    }

    #[test]
    fn role_actions() {
        assert!(role_allows(Role::Inputter, Action::CreateIncident));
        assert!(!role_allows(Role::Approver, Action::CreateIncident));
        assert!(!role_allows(Role::Approver, Action::ManageUsers));
        assert!(role_allows(Role::Approver, Action::ExportData));
        assert!(!role_allows(Role::Inputter, Action::ImportData));
        assert!(role_allows(Role::Administrator, Action::ResetData));
    }
}
