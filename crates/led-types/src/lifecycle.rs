//! Incident lifecycle: operational status and the two-level review state machine.
//!
//! The review axis runs `Pending Approval L1 -> Pending Approval L2 -> Approved`, with a
//! reject available at either pending level. `Approved` and `Rejected` are terminal.
//! `Draft` is a valid stored state but nothing transitions into it.

use crate::entity::{PersonSnapshot, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operational status, independent of the review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperationalStatus {
    #[default]
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReviewStatus {
    Draft,
    #[serde(rename = "Pending Approval L1", alias = "PendingApprovalL1")]
    PendingApprovalL1,
    #[serde(rename = "Pending Approval L2", alias = "PendingApprovalL2")]
    PendingApprovalL2,
    Approved,
    Rejected,
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Draft => write!(f, "Draft"),
            ReviewStatus::PendingApprovalL1 => write!(f, "Pending Approval L1"),
            ReviewStatus::PendingApprovalL2 => write!(f, "Pending Approval L2"),
            ReviewStatus::Approved => write!(f, "Approved"),
            ReviewStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Review level an incident is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalLevel {
    L1,
    L2,
}

impl ApprovalLevel {
    /// The only role allowed to decide at this level.
    pub fn reviewer_role(self) -> Role {
        match self {
            ApprovalLevel::L1 => Role::Approver,
            ApprovalLevel::L2 => Role::Administrator,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewDecision::Approved => write!(f, "approve"),
            ReviewDecision::Rejected => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {decision} an incident in review status {from}")]
pub struct IllegalTransition {
    pub from: ReviewStatus,
    pub decision: ReviewDecision,
}

impl ReviewStatus {
    /// Status every new incident starts in.
    pub const INITIAL: ReviewStatus = ReviewStatus::PendingApprovalL1;

    pub fn is_terminal(self) -> bool {
        matches!(self, ReviewStatus::Approved | ReviewStatus::Rejected)
    }

    pub fn is_pending(self) -> bool {
        self.approval_level().is_some()
    }

    pub fn approval_level(self) -> Option<ApprovalLevel> {
        match self {
            ReviewStatus::PendingApprovalL1 => Some(ApprovalLevel::L1),
            ReviewStatus::PendingApprovalL2 => Some(ApprovalLevel::L2),
            _ => None,
        }
    }

    pub fn allowed_transitions(self) -> Vec<ReviewStatus> {
        use ReviewStatus::*;
        match self {
            Draft => vec![],
            PendingApprovalL1 => vec![PendingApprovalL2, Rejected],
            PendingApprovalL2 => vec![Approved, Rejected],
            Approved => vec![],
            Rejected => vec![],
        }
    }

    /// Status reached by applying `decision` from this status.
    pub fn after(self, decision: ReviewDecision) -> Result<ReviewStatus, IllegalTransition> {
        let next = match (self, decision) {
            (ReviewStatus::PendingApprovalL1, ReviewDecision::Approved) => {
                ReviewStatus::PendingApprovalL2
            }
            (ReviewStatus::PendingApprovalL2, ReviewDecision::Approved) => ReviewStatus::Approved,
            (ReviewStatus::PendingApprovalL1 | ReviewStatus::PendingApprovalL2, ReviewDecision::Rejected) => {
                ReviewStatus::Rejected
            }
            (from, decision) => return Err(IllegalTransition { from, decision }),
        };
        debug_assert!(self.allowed_transitions().contains(&next));
        Ok(next)
    }
}

/// One approve/reject step in an incident's review trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEvent {
    pub decision: ReviewDecision,
    pub from_status: ReviewStatus,
    pub to_status: ReviewStatus,
    pub actor: PersonSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub at: DateTime<Utc>,
}
