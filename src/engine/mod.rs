//! Approval engine
//!
//! Each operation follows the same shape: read the cursor and its document,
//! classify the actor with the eligibility cascade, decide the transition
//! with [`lifecycle`], then write everything in one
//! [`TransitionCommit`](crate::store::TransitionCommit).

pub mod approval;
pub mod lifecycle;
pub mod outcome;
pub mod rejection;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, Instrument};

use crate::chain::{ChainContext, ChainError, ChainResolver, EffectiveChain};
use crate::config::ApprovalChainConfig;
use crate::diagnostics::{evaluate, gather_facts, Diagnostic, Failure, ReasonCode};
use crate::domain::{
    ActionKind, ApprovalAction, ApprovalStepId, ApprovalStepInstance, DocumentId,
    DocumentInstance, UserId,
};
use crate::error::{EngineError, EngineResult};
use crate::observability::{approval_metrics, ApprovalMetrics};
use crate::shutdown::ShutdownSignal;
use crate::store::{StoreError, TransitionCommit, WorkflowStore};
use crate::telemetry::{create_approval_span, generate_correlation_id};

pub use lifecycle::{ApprovalLifecycle, LifecycleEvent, Phase};
pub use outcome::{AdvanceOutcome, CaseSendReport, RejectOutcome, SendFailure, SendOutcome};

/// Drives documents through their approval chains against a [`WorkflowStore`]
pub struct ApprovalEngine<S> {
    store: Arc<S>,
    resolver: ChainResolver,
    shutdown: ShutdownSignal,
    metrics: &'static ApprovalMetrics,
}

impl<S: WorkflowStore> ApprovalEngine<S> {
    pub fn new(store: Arc<S>, resolver: ChainResolver) -> Self {
        Self {
            store,
            resolver,
            shutdown: ShutdownSignal::detached(),
            metrics: approval_metrics(),
        }
    }

    /// Engine with the high-authority threshold rule taken from configuration
    pub fn from_config(store: Arc<S>, config: &ApprovalChainConfig) -> Self {
        let resolver = ChainResolver::standard(
            config.workflow.high_authority_threshold,
            config.workflow.high_authority_role.clone(),
        );
        Self::new(store, resolver)
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn resolver(&self) -> &ChainResolver {
        &self.resolver
    }

    /// Effective chain for a document as the engine would use it right now
    pub async fn resolve_chain(&self, document: DocumentId) -> Result<EffectiveChain, Failure> {
        let document = self.load_document(document).await?;
        Ok(self.chain_for(&document).await?.map_err(EngineError::from)?)
    }

    /// Eligibility of `user` at the gate an approval step currently points to
    pub async fn diagnose(&self, step: ApprovalStepId, user: UserId) -> Diagnostic {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span("diagnose", None, Some(step.0), Some(user.0), &correlation_id);
        async {
            let step = self.load_step(step).await?;
            let document = self.load_document(step.document).await?;
            let (diagnostic, _) = self.assess(document, Some(step), user).await?;
            Ok::<_, EngineError>(diagnostic)
        }
        .instrument(span)
        .await
        .unwrap_or_else(|err| failure_diagnostic(err.into()))
    }

    /// Same as [`diagnose`](Self::diagnose) but keyed by document. Works
    /// before a document has been sent for review.
    pub async fn diagnose_document(&self, document: DocumentId, user: UserId) -> Diagnostic {
        let correlation_id = generate_correlation_id();
        let span = create_approval_span(
            "diagnose_document",
            Some(document.0),
            None,
            Some(user.0),
            &correlation_id,
        );
        async {
            let document = self.load_document(document).await?;
            let step = self.store.step_for_document(document.id).await?;
            let (diagnostic, _) = self.assess(document, step, user).await?;
            Ok::<_, EngineError>(diagnostic)
        }
        .instrument(span)
        .await
        .unwrap_or_else(|err| failure_diagnostic(err.into()))
    }

    async fn load_step(&self, id: ApprovalStepId) -> EngineResult<ApprovalStepInstance> {
        self.store
            .step(id)
            .await?
            .ok_or_else(|| StoreError::not_found("approval step", id).into())
    }

    async fn load_document(&self, id: DocumentId) -> EngineResult<DocumentInstance> {
        self.store
            .document(id)
            .await?
            .ok_or_else(|| StoreError::not_found("document", id).into())
    }

    /// Store faults are returned as the outer error; configuration defects
    /// as the inner one, since the cascade reports those as data.
    async fn chain_for(
        &self,
        document: &DocumentInstance,
    ) -> EngineResult<Result<EffectiveChain, ChainError>> {
        let Some(config) = self
            .store
            .document_type_config(document.category, document.document_type)
            .await?
        else {
            return Ok(Err(ChainError::MissingConfig {
                category: document.category,
                document_type: document.document_type,
            }));
        };
        let total = self.store.case_total(document.case).await?;
        let context = ChainContext::new(document.id, document.case, total);
        Ok(self.resolver.resolve(&config, &context))
    }

    /// Gather facts and run the cascade. The chain is skipped for terminal
    /// documents and handed back for the caller to act on.
    async fn assess(
        &self,
        document: DocumentInstance,
        step: Option<ApprovalStepInstance>,
        user: UserId,
    ) -> EngineResult<(Diagnostic, Option<Result<EffectiveChain, ChainError>>)> {
        let chain = if document.status.is_terminal() {
            None
        } else {
            Some(self.chain_for(&document).await?)
        };

        let facts = gather_facts(&*self.store, &*self.store, user, document, step, chain).await?;
        let diagnostic = evaluate(&facts);
        Ok((diagnostic, facts.chain))
    }

    /// Refuse with the diagnostic's failure unless the actor is eligible
    fn require_eligible(&self, diagnostic: Diagnostic, operation: &str) -> Result<(), Failure> {
        if diagnostic.ok {
            return Ok(());
        }
        self.metrics.record_denial();
        let code = diagnostic.code.unwrap_or(ReasonCode::Error);
        info!(
            operation,
            code = %code,
            document_id = ?diagnostic.document,
            "Approval action denied"
        );
        Err(Failure::from(diagnostic))
    }

    /// Last point at which an operation may still be abandoned cleanly
    fn ensure_not_cancelled(&self) -> EngineResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    async fn commit(&self, commit: TransitionCommit) -> EngineResult<()> {
        self.ensure_not_cancelled()?;
        self.store.commit_transition(commit).await.map_err(|err| {
            if matches!(err, StoreError::Conflict { .. }) {
                self.metrics.record_conflict();
            }
            EngineError::from(err)
        })
    }
}

/// Action-log entry for the gate `step` points to before it is mutated
fn record_action(
    step: &ApprovalStepInstance,
    actor: UserId,
    kind: ActionKind,
    note: Option<String>,
    at: DateTime<Utc>,
) -> ApprovalAction {
    ApprovalAction {
        document: step.document,
        step: step.id,
        actor,
        kind,
        role: step.role,
        level: step.level,
        sequence: step.sequence,
        note,
        at,
    }
}

fn failure_diagnostic(failure: Failure) -> Diagnostic {
    match failure.diagnostic {
        Some(diagnostic) => *diagnostic,
        None => Diagnostic::denied(failure.code, failure.message),
    }
}
