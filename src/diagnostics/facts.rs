use std::collections::BTreeSet;

use super::checks::EligibilityFacts;
use crate::chain::{ChainError, EffectiveChain};
use crate::domain::{ApprovalStepInstance, DocumentInstance, DocumentStatus, RoleId, UserId};
use crate::store::{ApprovalRepository, RoleDirectory, StoreError};

/// Collect the lookups the eligibility cascade needs.
///
/// Terminal documents only need their rejection detail; every other lookup is
/// skipped for them.
pub async fn gather_facts<R, A>(
    directory: &R,
    approvals: &A,
    user: UserId,
    document: DocumentInstance,
    step: Option<ApprovalStepInstance>,
    chain: Option<Result<EffectiveChain, ChainError>>,
) -> Result<EligibilityFacts, StoreError>
where
    R: RoleDirectory + ?Sized,
    A: ApprovalRepository + ?Sized,
{
    let mut facts = EligibilityFacts {
        user,
        document,
        step,
        chain,
        user_roles: BTreeSet::new(),
        gate_role_exists: false,
        live_holders: 0,
        rejection: None,
        last_user_action: None,
    };

    if facts.document.status.is_terminal() {
        if facts.document.status == DocumentStatus::Rejected {
            facts.rejection = approvals.last_rejection(facts.document.id).await?;
        }
        return Ok(facts);
    }

    facts.user_roles = directory
        .user(user)
        .await?
        .filter(|u| u.active)
        .map(|u| u.roles)
        .unwrap_or_default();

    if let Some(step) = &facts.step {
        let refs = step.gate().role_refs();
        let known: Vec<RoleId> = directory
            .existing_roles(&refs)
            .await?
            .into_iter()
            .map(|role| role.id)
            .collect();
        facts.gate_role_exists = !known.is_empty();
        if facts.gate_role_exists {
            facts.live_holders = directory.live_holder_count(&refs).await?;
        }
    }

    facts.last_user_action = approvals
        .last_action_by_user(user, facts.document.id)
        .await?;

    Ok(facts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{evaluate, ReasonCode};
    use crate::domain::*;
    use crate::store::{MockApprovalRepository, MockRoleDirectory};
    use mockall::predicate::*;

    fn pending_document() -> DocumentInstance {
        DocumentInstance {
            id: DocumentId(1),
            case: CaseId(1),
            category: CategoryId(1),
            document_type: DocumentTypeId(1),
            status: DocumentStatus::PendingApproval,
            approved: false,
            approved_at: None,
        }
    }

    fn step_at_manager() -> ApprovalStepInstance {
        ApprovalStepInstance {
            id: ApprovalStepId(3),
            document: DocumentId(1),
            case: CaseId(1),
            role: RoleId(3),
            role_name: "Manager".into(),
            level: 3,
            sequence: 3,
            status: StepStatus::Pending,
            approver: None,
            approved_at: None,
            note: None,
            revision: 0,
        }
    }

    #[tokio::test]
    async fn existing_role_without_holders_yields_no_eligible_approver() {
        let mut directory = MockRoleDirectory::new();
        directory
            .expect_user()
            .with(eq(UserId(7)))
            .returning(|id| {
                Ok(Some(User {
                    id,
                    name: "ana".into(),
                    roles: [RoleId(1)].into(),
                    active: true,
                }))
            });
        directory
            .expect_existing_roles()
            .returning(|_| Ok(vec![Role { id: RoleId(3), name: "Manager".into() }]));
        directory
            .expect_live_holder_count()
            .times(1)
            .returning(|_| Ok(0));

        let mut approvals = MockApprovalRepository::new();
        approvals
            .expect_last_action_by_user()
            .returning(|_, _| Ok(None));

        let facts = gather_facts(
            &directory,
            &approvals,
            UserId(7),
            pending_document(),
            Some(step_at_manager()),
            None,
        )
        .await
        .unwrap();

        assert!(facts.gate_role_exists);
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::NoEligibleApprover));
    }

    #[tokio::test]
    async fn holder_count_is_skipped_when_role_is_missing() {
        let mut directory = MockRoleDirectory::new();
        directory.expect_user().returning(|_| Ok(None));
        directory.expect_existing_roles().returning(|_| Ok(Vec::new()));
        directory.expect_live_holder_count().never();

        let mut approvals = MockApprovalRepository::new();
        approvals
            .expect_last_action_by_user()
            .returning(|_, _| Ok(None));

        let facts = gather_facts(
            &directory,
            &approvals,
            UserId(7),
            pending_document(),
            Some(step_at_manager()),
            None,
        )
        .await
        .unwrap();

        assert!(facts.user_roles.is_empty());
        assert_eq!(evaluate(&facts).code, Some(ReasonCode::InvalidGateConfig));
    }

    #[tokio::test]
    async fn terminal_document_only_reads_rejection() {
        let mut directory = MockRoleDirectory::new();
        directory.expect_user().never();
        directory.expect_existing_roles().never();

        let mut approvals = MockApprovalRepository::new();
        approvals
            .expect_last_rejection()
            .with(eq(DocumentId(1)))
            .times(1)
            .returning(|_| {
                Ok(Some(RejectionDetail {
                    actor: UserId(2),
                    actor_name: None,
                    at: chrono::Utc::now(),
                    note: Some("wrong totals".into()),
                }))
            });

        let mut document = pending_document();
        document.status = DocumentStatus::Rejected;

        let facts = gather_facts(&directory, &approvals, UserId(7), document, None, None)
            .await
            .unwrap();

        let diagnostic = evaluate(&facts);
        assert_eq!(diagnostic.code, Some(ReasonCode::AlreadyRejected));
        assert_eq!(diagnostic.rejection.unwrap().note.as_deref(), Some("wrong totals"));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let mut directory = MockRoleDirectory::new();
        directory
            .expect_user()
            .returning(|_| Err(StoreError::backend("connection reset")));
        let approvals = MockApprovalRepository::new();

        let err = gather_facts(
            &directory,
            &approvals,
            UserId(7),
            pending_document(),
            Some(step_at_manager()),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, StoreError::Backend { .. }));
    }
}
