use chrono::Utc;
use tracing::{info, Instrument};

use super::lifecycle::{self, LifecycleEvent, Phase};
use super::outcome::RejectOutcome;
use super::{record_action, ApprovalEngine};
use crate::diagnostics::Failure;
use crate::domain::{ActionKind, ApprovalStepId, DocumentStatus, StepStatus, UserId};
use crate::error::EngineError;
use crate::store::{TransitionCommit, WorkflowStore};
use crate::telemetry::{create_approval_span, generate_correlation_id};

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// Reject the document at whatever gate it is waiting on.
    ///
    /// A single rejection finalizes the whole document. Blank notes are
    /// stored as absent.
    pub async fn reject(
        &self,
        step: ApprovalStepId,
        user: UserId,
        note: Option<String>,
    ) -> Result<RejectOutcome, Failure> {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span("reject", None, Some(step.0), Some(user.0), &correlation_id);
        self.reject_inner(step, user, note).instrument(span).await
    }

    async fn reject_inner(
        &self,
        step_id: ApprovalStepId,
        user: UserId,
        note: Option<String>,
    ) -> Result<RejectOutcome, Failure> {
        let mut step = self.load_step(step_id).await?;
        let mut document = self.load_document(step.document).await?;

        let (diagnostic, chain) = self.assess(document.clone(), Some(step.clone()), user).await?;
        self.require_eligible(diagnostic, "reject")?;

        // Rejection does not depend on a healthy chain; a broken one still
        // lets the gate holder stop the document.
        let (position, last) = match chain {
            Some(Ok(chain)) => (
                chain.position_of(step.role, step.sequence).unwrap_or(0),
                chain.last_index(),
            ),
            _ => (0, 0),
        };
        if lifecycle::step(position, last, LifecycleEvent::Reject) != Phase::Rejected {
            return Err(EngineError::Contract(
                "Reject event did not produce a rejected lifecycle".to_string(),
            )
            .into());
        }

        let note = note.filter(|n| !n.trim().is_empty());
        let now = Utc::now();
        let expected_revision = step.revision;
        let action = record_action(&step, user, ActionKind::Rejected, note.clone(), now);

        step.status = StepStatus::Rejected;
        step.approver = Some(user);
        step.approved_at = Some(now);
        step.note = note.clone();
        document.status = DocumentStatus::Rejected;
        document.approved = false;
        document.approved_at = None;
        let document_id = document.id;

        self.commit(TransitionCommit {
            step,
            expected_revision,
            document: Some(document),
            action,
        })
        .await?;

        self.metrics.record_rejection();
        info!(
            document_id = %document_id,
            step_id = %step_id,
            has_note = note.is_some(),
            "Document rejected"
        );
        Ok(RejectOutcome {
            step: step_id,
            document: document_id,
            rejected_by: user,
            rejected_at: now,
            note,
        })
    }
}
