use chrono::Utc;
use tracing::{info, warn, Instrument};

use super::lifecycle::{self, LifecycleEvent, Phase};
use super::outcome::{AdvanceOutcome, CaseSendReport, SendFailure, SendOutcome};
use super::{record_action, ApprovalEngine};
use crate::diagnostics::{checks, Failure, ReasonCode};
use crate::domain::{
    ActionKind, ApprovalStepId, CaseId, DocumentId, DocumentInstance, DocumentStatus, StepStatus,
    UserId,
};
use crate::error::{EngineError, EngineResult};
use crate::observability::OperationTimer;
use crate::store::{TransitionCommit, WorkflowStore};
use crate::telemetry::{create_approval_span, generate_correlation_id};

impl<S: WorkflowStore> ApprovalEngine<S> {
    /// Approve the gate `step` currently points to.
    ///
    /// Intermediate gates move the cursor to the next chain entry and leave
    /// the document pending. The last gate finalizes the document.
    pub async fn advance(
        &self,
        step: ApprovalStepId,
        user: UserId,
    ) -> Result<AdvanceOutcome, Failure> {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span("advance", None, Some(step.0), Some(user.0), &correlation_id);
        let timer = OperationTimer::new("advance");
        let result = self.advance_inner(step, user).instrument(span).await;
        timer.finish();
        result
    }

    async fn advance_inner(
        &self,
        step_id: ApprovalStepId,
        user: UserId,
    ) -> Result<AdvanceOutcome, Failure> {
        let mut step = self.load_step(step_id).await?;
        let mut document = self.load_document(step.document).await?;

        let (diagnostic, chain) = self.assess(document.clone(), Some(step.clone()), user).await?;
        self.require_eligible(diagnostic, "advance")?;

        let chain = chain
            .ok_or_else(|| {
                EngineError::Contract(format!(
                    "Document {} has no resolved chain while pending",
                    document.id
                ))
            })?
            .map_err(EngineError::from)?;

        let (position, position_recovered) = match chain.position_of(step.role, step.sequence) {
            Some(position) => (position, false),
            None => {
                self.metrics.record_position_fallback();
                warn!(
                    signal = "chain_position_fallback",
                    document_id = %document.id,
                    step_id = %step.id,
                    role = %step.role_name,
                    sequence = step.sequence,
                    "Approval step does not match any gate of the effective chain; restarting from the first gate"
                );
                (0, true)
            }
        };

        let now = Utc::now();
        let expected_revision = step.revision;
        let action = record_action(&step, user, ActionKind::Approved, None, now);

        match lifecycle::step(position, chain.last_index(), LifecycleEvent::Approve) {
            Phase::Pending(next) => {
                let next_gate = chain.get(next).cloned().ok_or_else(|| {
                    EngineError::Contract(format!("Chain position {next} is out of range"))
                })?;
                step.move_to(&next_gate);

                self.commit(TransitionCommit {
                    step,
                    expected_revision,
                    document: None,
                    action,
                })
                .await?;

                self.metrics.record_advance();
                info!(
                    document_id = %document.id,
                    step_id = %step_id,
                    next_gate = %next_gate,
                    "Approval moved to next gate"
                );
                Ok(AdvanceOutcome::MovedToNext {
                    step: step_id,
                    document: document.id,
                    next_gate,
                    position_recovered,
                })
            }
            Phase::Approved => {
                step.status = StepStatus::Approved;
                step.approver = Some(user);
                step.approved_at = Some(now);
                document.status = DocumentStatus::Approved;
                document.approved = true;
                document.approved_at = Some(now);
                let document_id = document.id;
                let case = document.case;

                self.commit(TransitionCommit {
                    step,
                    expected_revision,
                    document: Some(document),
                    action,
                })
                .await?;

                self.metrics.record_advance();
                self.metrics.record_finalization();
                let all_case_documents_approved = self.case_fully_approved(case).await;
                info!(
                    document_id = %document_id,
                    step_id = %step_id,
                    case_id = %case,
                    all_case_documents_approved,
                    "Document approved"
                );
                Ok(AdvanceOutcome::FinalizedApproved {
                    step: step_id,
                    document: document_id,
                    approved_at: now,
                    all_case_documents_approved,
                    position_recovered,
                })
            }
            Phase::Rejected => Err(EngineError::Contract(
                "Approve event produced a rejected lifecycle".to_string(),
            )
            .into()),
        }
    }

    /// Informational only. A failed read after a successful commit is logged
    /// and reported as not fully approved.
    async fn case_fully_approved(&self, case: CaseId) -> bool {
        match self.store.steps_for_case(case).await {
            Ok(steps) => {
                !steps.is_empty() && steps.iter().all(|s| s.status == StepStatus::Approved)
            }
            Err(err) => {
                warn!(case_id = %case, error = %err, "Could not compute case approval summary");
                false
            }
        }
    }

    /// Open review for a document: place its cursor on the first gate of the
    /// effective chain and mark it pending. Only `uploaded` documents can be
    /// sent; a rejected one is terminal and answers with its rejection detail.
    pub async fn send_for_approval(&self, document: DocumentId) -> Result<SendOutcome, Failure> {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span(
            "send_for_approval",
            Some(document.0),
            None,
            None,
            &correlation_id,
        );
        async {
            let document = self.load_document(document).await?;
            self.send_document(&document).await
        }
        .instrument(span)
        .await
    }

    async fn send_document(&self, document: &DocumentInstance) -> Result<SendOutcome, Failure> {
        match document.status {
            DocumentStatus::Uploaded => {}
            DocumentStatus::Rejected => {
                let rejection = self
                    .store
                    .last_rejection(document.id)
                    .await
                    .map_err(EngineError::from)?;
                let diagnostic = checks::rejected(document.id, rejection).for_document(
                    document.id,
                    document.status,
                    None,
                );
                return Err(diagnostic.into());
            }
            DocumentStatus::PendingApproval => {
                return Err(Failure::new(
                    ReasonCode::InvalidAction,
                    format!("Document {} is already pending approval", document.id),
                ))
            }
            status => {
                return Err(Failure::new(
                    ReasonCode::AlreadyFinalized,
                    format!(
                        "Document {} is {} and cannot be sent for approval",
                        document.id, status
                    ),
                ))
            }
        }

        let config = self
            .store
            .document_type_config(document.category, document.document_type)
            .await
            .map_err(EngineError::from)?;
        if let Some(config) = &config {
            if !config.requires_approval {
                return Err(Failure::new(
                    ReasonCode::InvalidAction,
                    format!(
                        "Documents of type '{}' do not require approval",
                        config.name
                    ),
                ));
            }
        }

        let chain = self.chain_for(document).await?.map_err(EngineError::from)?;
        let first_gate = chain.first().clone();

        self.ensure_not_cancelled()?;
        let step = self
            .store
            .open_review(document.id, first_gate.clone())
            .await
            .map_err(EngineError::from)?;

        info!(
            document_id = %document.id,
            step_id = %step.id,
            first_gate = %first_gate,
            chain_length = chain.len(),
            "Document sent for approval"
        );
        Ok(SendOutcome {
            document: document.id,
            step: step.id,
            first_gate,
            chain_length: chain.len(),
        })
    }

    /// Send every eligible document of a case. One document failing does not
    /// stop the others.
    pub async fn send_case_for_approval(&self, case: CaseId) -> Result<CaseSendReport, Failure> {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span("send_case_for_approval", None, None, None, &correlation_id);
        async {
            let documents = self
                .store
                .documents_for_case(case)
                .await
                .map_err(EngineError::from)?;

            let mut report = CaseSendReport {
                case,
                sent: Vec::new(),
                failed: Vec::new(),
                skipped: Vec::new(),
            };

            for document in documents {
                if !self.is_sendable(&document).await? {
                    report.skipped.push(document.id);
                    continue;
                }
                match self.send_document(&document).await {
                    Ok(outcome) => report.sent.push(outcome),
                    Err(failure) => report.failed.push(SendFailure {
                        document: document.id,
                        failure,
                    }),
                }
            }

            info!(
                case_id = %case,
                sent = report.sent.len(),
                failed = report.failed.len(),
                skipped = report.skipped.len(),
                "Case sent for approval"
            );
            Ok::<_, Failure>(report)
        }
        .instrument(span)
        .await
    }

    async fn is_sendable(&self, document: &DocumentInstance) -> EngineResult<bool> {
        if document.status != DocumentStatus::Uploaded {
            return Ok(false);
        }
        let requires_approval = self
            .store
            .document_type_config(document.category, document.document_type)
            .await?
            .map(|config| config.requires_approval)
            // Missing configuration is reported as a failure by the send itself
            .unwrap_or(true);
        Ok(requires_approval)
    }
}

