use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::diagnostics::Failure;
use crate::domain::{ApprovalStepId, CaseId, DocumentId, GateStep, UserId};

/// Result of a successful approve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    MovedToNext {
        step: ApprovalStepId,
        document: DocumentId,
        next_gate: GateStep,
        /// The cursor did not match the chain and was restarted at the first gate
        position_recovered: bool,
    },
    FinalizedApproved {
        step: ApprovalStepId,
        document: DocumentId,
        approved_at: DateTime<Utc>,
        /// Informational only; the case itself is never touched
        all_case_documents_approved: bool,
        position_recovered: bool,
    },
}

impl AdvanceOutcome {
    pub fn is_final(&self) -> bool {
        matches!(self, AdvanceOutcome::FinalizedApproved { .. })
    }

    pub fn next_gate(&self) -> Option<&GateStep> {
        match self {
            AdvanceOutcome::MovedToNext { next_gate, .. } => Some(next_gate),
            AdvanceOutcome::FinalizedApproved { .. } => None,
        }
    }

    pub fn position_recovered(&self) -> bool {
        match self {
            AdvanceOutcome::MovedToNext {
                position_recovered, ..
            }
            | AdvanceOutcome::FinalizedApproved {
                position_recovered, ..
            } => *position_recovered,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectOutcome {
    pub step: ApprovalStepId,
    pub document: DocumentId,
    pub rejected_by: UserId,
    pub rejected_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendOutcome {
    pub document: DocumentId,
    pub step: ApprovalStepId,
    pub first_gate: GateStep,
    pub chain_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendFailure {
    pub document: DocumentId,
    pub failure: Failure,
}

/// Per-document results of sending a whole case for approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseSendReport {
    pub case: CaseId,
    pub sent: Vec<SendOutcome>,
    pub failed: Vec<SendFailure>,
    /// Documents already in review, finalized, or not requiring approval
    pub skipped: Vec<DocumentId>,
}
