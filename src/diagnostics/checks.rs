//! Ordered eligibility cascade
//!
//! Each check is a pure function over an [`EligibilityFacts`] snapshot. The
//! first check that returns a [`Diagnostic`] decides the outcome, so every
//! failure kind can be exercised on its own by building the matching facts.

use std::collections::BTreeSet;

use super::types::{Diagnostic, ReasonCode};
use crate::chain::{ChainError, EffectiveChain};
use crate::domain::{
    ApprovalStepInstance, DocumentId, DocumentInstance, DocumentStatus, GateStep,
    RejectionDetail, RoleId, StepStatus, UserAction, UserId,
};

/// Everything the cascade needs to classify one actor against one document
#[derive(Debug, Clone)]
pub struct EligibilityFacts {
    pub user: UserId,
    pub document: DocumentInstance,
    pub step: Option<ApprovalStepInstance>,
    /// Absent for terminal documents, where the chain is never consulted
    pub chain: Option<Result<EffectiveChain, ChainError>>,
    pub user_roles: BTreeSet<RoleId>,
    /// Whether the current gate's role resolves to a live role
    pub gate_role_exists: bool,
    /// Active users holding the current gate's role
    pub live_holders: usize,
    pub rejection: Option<RejectionDetail>,
    pub last_user_action: Option<UserAction>,
}

impl EligibilityFacts {
    fn pending_gate(&self) -> Option<GateStep> {
        self.step
            .as_ref()
            .filter(|step| step.status == StepStatus::Pending)
            .map(|step| step.gate())
    }

    fn holds_gate_role(&self) -> bool {
        self.step
            .as_ref()
            .is_some_and(|step| self.user_roles.contains(&step.role))
    }

    fn decorate(&self, diagnostic: Diagnostic) -> Diagnostic {
        let diagnostic = diagnostic.for_document(
            self.document.id,
            self.document.status,
            self.step.as_ref().map(|s| s.id),
        );
        match self.pending_gate() {
            Some(gate) => diagnostic.with_gate(gate),
            None => diagnostic,
        }
    }
}

type Check = fn(&EligibilityFacts) -> Option<Diagnostic>;

/// Checks in evaluation order
pub const CASCADE: &[(&str, Check)] = &[
    ("terminal_status", terminal_status as Check),
    ("review_open", review_open as Check),
    ("holds_gate_role", holds_gate_role as Check),
    ("gate_role_exists", gate_role_exists as Check),
    ("eligible_approver_exists", eligible_approver_exists as Check),
    ("chain_resolvable", chain_resolvable as Check),
    ("role_elsewhere_in_chain", role_elsewhere_in_chain as Check),
    ("role_not_in_gate", role_not_in_gate as Check),
];

/// Run the cascade. Always yields a diagnostic because the final check is total.
pub fn evaluate(facts: &EligibilityFacts) -> Diagnostic {
    let diagnostic = CASCADE
        .iter()
        .find_map(|(name, check)| {
            check(facts).map(|diagnostic| {
                tracing::trace!(check = *name, ok = diagnostic.ok, "Eligibility decided");
                diagnostic
            })
        })
        .unwrap_or_else(|| {
            Diagnostic::denied(ReasonCode::Error, "Eligibility could not be determined")
        });
    facts.decorate(diagnostic)
}

/// Denial for a document that was already rejected, naming who, when and why
pub fn rejected(document: DocumentId, rejection: Option<RejectionDetail>) -> Diagnostic {
    let message = match &rejection {
        Some(detail) => format!(
            "Document {} was rejected by {} at {}{}",
            document,
            detail
                .actor_name
                .clone()
                .unwrap_or_else(|| format!("user {}", detail.actor)),
            detail.at.to_rfc3339(),
            detail
                .note
                .as_ref()
                .map(|n| format!(": {n}"))
                .unwrap_or_default()
        ),
        None => format!("Document {document} was already rejected"),
    };
    Diagnostic::denied(ReasonCode::AlreadyRejected, message).with_rejection(rejection)
}

fn terminal_status(facts: &EligibilityFacts) -> Option<Diagnostic> {
    match facts.document.status {
        DocumentStatus::Rejected => Some(rejected(facts.document.id, facts.rejection.clone())),
        status if status.is_terminal() => Some(Diagnostic::denied(
            ReasonCode::AlreadyFinalized,
            format!(
                "Document {} is already {} and accepts no further approval actions",
                facts.document.id, status
            ),
        )),
        _ => None,
    }
}

fn review_open(facts: &EligibilityFacts) -> Option<Diagnostic> {
    if facts.document.status != DocumentStatus::PendingApproval {
        return Some(Diagnostic::denied(
            ReasonCode::InvalidAction,
            format!(
                "Document {} is {}; send it for approval first",
                facts.document.id, facts.document.status
            ),
        ));
    }
    match &facts.step {
        None => Some(Diagnostic::denied(
            ReasonCode::InvalidAction,
            format!(
                "Document {} is pending approval but has no approval step",
                facts.document.id
            ),
        )),
        Some(step) if step.status != StepStatus::Pending => Some(Diagnostic::denied(
            ReasonCode::InvalidAction,
            format!(
                "Approval step {} is {} while its document is still pending",
                step.id,
                step.status.as_str()
            ),
        )),
        Some(_) => None,
    }
}

fn holds_gate_role(facts: &EligibilityFacts) -> Option<Diagnostic> {
    let step = facts.step.as_ref()?;
    facts.holds_gate_role().then(|| {
        Diagnostic::eligible(format!(
            "User {} may act on gate {}",
            facts.user,
            step.gate()
        ))
    })
}

fn gate_role_exists(facts: &EligibilityFacts) -> Option<Diagnostic> {
    let step = facts.step.as_ref()?;
    (!facts.gate_role_exists).then(|| {
        Diagnostic::denied(
            ReasonCode::InvalidGateConfig,
            format!(
                "Gate {} references role '{}' (id {}) which does not exist; fix the gate configuration",
                step.gate(),
                step.role_name,
                step.role
            ),
        )
    })
}

fn eligible_approver_exists(facts: &EligibilityFacts) -> Option<Diagnostic> {
    let step = facts.step.as_ref()?;
    (facts.live_holders == 0).then(|| {
        Diagnostic::denied(
            ReasonCode::NoEligibleApprover,
            format!(
                "No active user holds role '{}' required by gate {}; assign the role to someone",
                step.role_name,
                step.gate()
            ),
        )
    })
}

fn chain_resolvable(facts: &EligibilityFacts) -> Option<Diagnostic> {
    match &facts.chain {
        Some(Err(err)) => Some(Diagnostic::denied(
            ReasonCode::InvalidGateConfig,
            err.to_string(),
        )),
        _ => None,
    }
}

fn role_elsewhere_in_chain(facts: &EligibilityFacts) -> Option<Diagnostic> {
    let step = facts.step.as_ref()?;
    let chain = facts.chain.as_ref()?.as_ref().ok()?;
    chain.contains_any_role(&facts.user_roles).then(|| {
        Diagnostic::denied(
            ReasonCode::NotYourTurn,
            format!(
                "Document {} is waiting on {}; your role acts at a different gate",
                facts.document.id,
                step.gate()
            ),
        )
        .with_history(facts.last_user_action.clone())
    })
}

fn role_not_in_gate(facts: &EligibilityFacts) -> Option<Diagnostic> {
    Some(Diagnostic::denied(
        ReasonCode::RoleNotInGate,
        format!(
            "None of user {}'s roles take part in the approval chain of document {}",
            facts.user, facts.document.id
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainResolver;
    use crate::chain::ChainContext;
    use crate::domain::*;
    use chrono::Utc;

    fn chain() -> EffectiveChain {
        let config = DocumentTypeConfig {
            category: CategoryId(1),
            document_type: DocumentTypeId(1),
            name: "Contract".into(),
            ordering: 0,
            mandatory: true,
            generated: false,
            upload_required: true,
            requires_approval: true,
            steps: vec![
                GateStep::new(RoleId(1), "Analyst", 1, 1),
                GateStep::new(RoleId(2), "AsstManager", 2, 2),
                GateStep::new(RoleId(3), "Manager", 3, 3),
            ],
        };
        ChainResolver::new()
            .resolve(&config, &ChainContext::new(DocumentId(5), CaseId(1), Money(0)))
            .unwrap()
    }

    fn facts_at(gate: GateStep, roles: &[u64]) -> EligibilityFacts {
        EligibilityFacts {
            user: UserId(42),
            document: DocumentInstance {
                id: DocumentId(5),
                case: CaseId(1),
                category: CategoryId(1),
                document_type: DocumentTypeId(1),
                status: DocumentStatus::PendingApproval,
                approved: false,
                approved_at: None,
            },
            step: Some(ApprovalStepInstance {
                id: ApprovalStepId(9),
                document: DocumentId(5),
                case: CaseId(1),
                role: gate.role,
                role_name: gate.role_name.clone(),
                level: gate.level,
                sequence: gate.sequence,
                status: StepStatus::Pending,
                approver: None,
                approved_at: None,
                note: None,
                revision: 0,
            }),
            chain: Some(Ok(chain())),
            user_roles: roles.iter().copied().map(RoleId).collect(),
            gate_role_exists: true,
            live_holders: 2,
            rejection: None,
            last_user_action: None,
        }
    }

    fn analyst_gate() -> GateStep {
        GateStep::new(RoleId(1), "Analyst", 1, 1)
    }

    #[test]
    fn holder_of_gate_role_is_eligible() {
        let diagnostic = evaluate(&facts_at(analyst_gate(), &[1]));
        assert!(diagnostic.ok);
        assert_eq!(diagnostic.code, None);
        assert_eq!(diagnostic.required_roles, vec![RoleId(1)]);
        assert_eq!(diagnostic.current_gate, Some(analyst_gate()));
    }

    #[test]
    fn later_gate_role_is_not_your_turn_with_history() {
        let mut facts = facts_at(analyst_gate(), &[3]);
        let history = UserAction {
            kind: ActionKind::Approved,
            level: 3,
            sequence: 3,
            at: Utc::now(),
        };
        facts.last_user_action = Some(history.clone());

        let diagnostic = evaluate(&facts);
        assert_eq!(diagnostic.code, Some(ReasonCode::NotYourTurn));
        assert_eq!(diagnostic.user_history, Some(history));
    }

    #[test]
    fn unrelated_role_is_role_not_in_gate() {
        let diagnostic = evaluate(&facts_at(analyst_gate(), &[7]));
        assert_eq!(diagnostic.code, Some(ReasonCode::RoleNotInGate));
        assert!(!diagnostic.ok);
    }

    #[test]
    fn missing_role_beats_everything_after_it() {
        let mut facts = facts_at(analyst_gate(), &[3]);
        facts.gate_role_exists = false;
        facts.live_holders = 0;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::InvalidGateConfig));
    }

    #[test]
    fn zero_holders_is_no_eligible_approver_not_your_turn() {
        let mut facts = facts_at(analyst_gate(), &[3]);
        facts.live_holders = 0;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::NoEligibleApprover));
    }

    #[test]
    fn zero_holders_does_not_block_a_holder() {
        // The actor holds the role, so holder count is irrelevant
        let mut facts = facts_at(analyst_gate(), &[1]);
        facts.live_holders = 0;
        assert!(evaluate(&facts).ok);
    }

    #[test]
    fn terminal_documents_short_circuit() {
        let mut facts = facts_at(analyst_gate(), &[1]);
        facts.document.status = DocumentStatus::Approved;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::AlreadyFinalized));

        facts.document.status = DocumentStatus::Deleted;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::AlreadyFinalized));

        facts.document.status = DocumentStatus::Rejected;
        facts.rejection = Some(RejectionDetail {
            actor: UserId(8),
            actor_name: Some("mira".into()),
            at: Utc::now(),
            note: Some("missing signature".into()),
        });
        let diagnostic = evaluate(&facts);
        assert_eq!(diagnostic.code, Some(ReasonCode::AlreadyRejected));
        assert!(diagnostic.message.contains("mira"));
        assert!(diagnostic.message.contains("missing signature"));
        assert_eq!(diagnostic.rejection.unwrap().actor, UserId(8));
    }

    #[test]
    fn document_not_in_review_is_invalid_action() {
        let mut facts = facts_at(analyst_gate(), &[1]);
        facts.document.status = DocumentStatus::Uploaded;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::InvalidAction));

        let mut facts = facts_at(analyst_gate(), &[1]);
        facts.step = None;
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::InvalidAction));
    }

    #[test]
    fn broken_chain_is_invalid_gate_config_for_non_holders() {
        let mut facts = facts_at(analyst_gate(), &[3]);
        facts.chain = Some(Err(ChainError::Empty {
            category: CategoryId(1),
            document_type: DocumentTypeId(1),
        }));
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::InvalidGateConfig));
    }
}
