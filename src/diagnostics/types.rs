use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{
    ApprovalStepId, DocumentId, DocumentStatus, GateStep, RejectionDetail, RoleId, UserAction,
};

/// Why an actor can or cannot act on a document, returned as data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    NotYourTurn,
    RoleNotInGate,
    InvalidGateConfig,
    NoEligibleApprover,
    AlreadyFinalized,
    AlreadyRejected,
    ApprovalNotFound,
    DocumentNotFound,
    InvalidAction,
    Error,
}

impl ReasonCode {
    pub const ALL: [ReasonCode; 10] = [
        ReasonCode::NotYourTurn,
        ReasonCode::RoleNotInGate,
        ReasonCode::InvalidGateConfig,
        ReasonCode::NoEligibleApprover,
        ReasonCode::AlreadyFinalized,
        ReasonCode::AlreadyRejected,
        ReasonCode::ApprovalNotFound,
        ReasonCode::DocumentNotFound,
        ReasonCode::InvalidAction,
        ReasonCode::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReasonCode::NotYourTurn => "NOT_YOUR_TURN",
            ReasonCode::RoleNotInGate => "ROLE_NOT_IN_GATE",
            ReasonCode::InvalidGateConfig => "INVALID_GATE_CONFIG",
            ReasonCode::NoEligibleApprover => "NO_ELIGIBLE_APPROVER",
            ReasonCode::AlreadyFinalized => "ALREADY_FINALIZED",
            ReasonCode::AlreadyRejected => "ALREADY_REJECTED",
            ReasonCode::ApprovalNotFound => "APPROVAL_NOT_FOUND",
            ReasonCode::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            ReasonCode::InvalidAction => "INVALID_ACTION",
            ReasonCode::Error => "ERROR",
        }
    }

    /// Codes that point at broken configuration rather than at the actor
    pub fn is_configuration_defect(self) -> bool {
        matches!(
            self,
            ReasonCode::InvalidGateConfig | ReasonCode::NoEligibleApprover
        )
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an eligibility check, shaped for presentation layers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub ok: bool,
    pub code: Option<ReasonCode>,
    pub message: String,
    pub document: Option<DocumentId>,
    pub step: Option<ApprovalStepId>,
    pub document_status: Option<DocumentStatus>,
    pub current_gate: Option<GateStep>,
    pub required_roles: Vec<RoleId>,
    /// The acting user's latest action on this document
    pub user_history: Option<UserAction>,
    pub rejection: Option<RejectionDetail>,
}

impl Diagnostic {
    pub fn eligible(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            code: None,
            message: message.into(),
            document: None,
            step: None,
            document_status: None,
            current_gate: None,
            required_roles: Vec::new(),
            user_history: None,
            rejection: None,
        }
    }

    pub fn denied(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            code: Some(code),
            ..Self::eligible(message)
        }
    }

    pub fn with_gate(mut self, gate: GateStep) -> Self {
        self.required_roles = vec![gate.role];
        self.current_gate = Some(gate);
        self
    }

    pub fn with_history(mut self, history: Option<UserAction>) -> Self {
        self.user_history = history;
        self
    }

    pub fn with_rejection(mut self, rejection: Option<RejectionDetail>) -> Self {
        self.rejection = rejection;
        self
    }

    pub fn for_document(
        mut self,
        document: DocumentId,
        status: DocumentStatus,
        step: Option<ApprovalStepId>,
    ) -> Self {
        self.document = Some(document);
        self.document_status = Some(status);
        self.step = step;
        self
    }
}

/// Non-Ok result of an engine operation. Always carries a code and a message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct Failure {
    pub code: ReasonCode,
    pub message: String,
    pub diagnostic: Option<Box<Diagnostic>>,
}

impl Failure {
    pub fn new(code: ReasonCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            diagnostic: None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectionDetail> {
        self.diagnostic.as_ref().and_then(|d| d.rejection.as_ref())
    }
}

impl From<Diagnostic> for Failure {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            code: diagnostic.code.unwrap_or(ReasonCode::Error),
            message: diagnostic.message.clone(),
            diagnostic: Some(Box::new(diagnostic)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_serialize_screaming_snake_case() {
        let json = serde_json::to_string(&ReasonCode::NoEligibleApprover).unwrap();
        assert_eq!(json, "\"NO_ELIGIBLE_APPROVER\"");
        assert_eq!(ReasonCode::NotYourTurn.to_string(), "NOT_YOUR_TURN");
    }

    #[test]
    fn as_str_matches_the_wire_name_of_every_code() {
        for code in ReasonCode::ALL {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            let back: ReasonCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn failure_from_diagnostic_keeps_code_and_message() {
        let diagnostic = Diagnostic::denied(ReasonCode::RoleNotInGate, "not part of this workflow");
        let failure = Failure::from(diagnostic);

        assert_eq!(failure.code, ReasonCode::RoleNotInGate);
        assert_eq!(failure.message, "not part of this workflow");
        assert_eq!(failure.to_string(), "ROLE_NOT_IN_GATE: not part of this workflow");
        assert!(failure.diagnostic.is_some());
    }

    #[test]
    fn configuration_defects() {
        assert!(ReasonCode::InvalidGateConfig.is_configuration_defect());
        assert!(ReasonCode::NoEligibleApprover.is_configuration_defect());
        assert!(!ReasonCode::NotYourTurn.is_configuration_defect());
    }
}
