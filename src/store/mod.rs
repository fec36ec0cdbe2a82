//! Collaborator interfaces consumed by the approval engine
//!
//! The engine never talks to a database directly. Everything it reads or
//! writes goes through the traits below, so the persistence layer owns
//! transaction semantics and tests can inject in-memory or mocked stores.

pub mod fixture;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::*;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

pub use fixture::{CaseTotal, Fixture};
pub use memory::InMemoryStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("Approval step {step} changed concurrently (expected revision {expected}, found {found})")]
    Conflict {
        step: ApprovalStepId,
        expected: u64,
        found: u64,
    },
    #[error("Storage backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }
}

/// Everything one approve/reject writes, applied as a single unit.
///
/// Stores must apply all three parts or none, and must refuse the write when
/// the stored step revision no longer equals `expected_revision`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    pub step: ApprovalStepInstance,
    pub expected_revision: u64,
    pub document: Option<DocumentInstance>,
    pub action: ApprovalAction,
}

/// Gate configuration lookup, read-only to the engine
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait GateConfigStore: Send + Sync {
    async fn document_type_config(
        &self,
        category: CategoryId,
        document_type: DocumentTypeId,
    ) -> Result<Option<DocumentTypeConfig>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Roles that exist, matched by id or by name
    async fn existing_roles(&self, refs: &[RoleRef]) -> Result<Vec<Role>, StoreError>;

    /// Number of active users holding any of the referenced roles
    async fn live_holder_count(&self, refs: &[RoleRef]) -> Result<usize, StoreError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn document(&self, id: DocumentId) -> Result<Option<DocumentInstance>, StoreError>;

    async fn documents_for_case(&self, case: CaseId) -> Result<Vec<DocumentInstance>, StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn step(&self, id: ApprovalStepId) -> Result<Option<ApprovalStepInstance>, StoreError>;

    async fn step_for_document(
        &self,
        document: DocumentId,
    ) -> Result<Option<ApprovalStepInstance>, StoreError>;

    async fn steps_for_case(&self, case: CaseId) -> Result<Vec<ApprovalStepInstance>, StoreError>;

    async fn last_rejection(
        &self,
        document: DocumentId,
    ) -> Result<Option<RejectionDetail>, StoreError>;

    async fn last_action_by_user(
        &self,
        user: UserId,
        document: DocumentId,
    ) -> Result<Option<UserAction>, StoreError>;

    /// Place the document's cursor on `first_gate` and mark the document
    /// pending. Reuses an existing cursor row when the document is re-sent.
    async fn open_review(
        &self,
        document: DocumentId,
        first_gate: GateStep,
    ) -> Result<ApprovalStepInstance, StoreError>;

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(), StoreError>;
}

#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait CaseLedger: Send + Sync {
    /// Aggregate monetary total of the case
    async fn case_total(&self, case: CaseId) -> Result<Money, StoreError>;
}

/// A store that serves every collaborator interface
pub trait WorkflowStore:
    GateConfigStore + RoleDirectory + DocumentRepository + ApprovalRepository + CaseLedger
{
}

impl<T> WorkflowStore for T where
    T: GateConfigStore + RoleDirectory + DocumentRepository + ApprovalRepository + CaseLedger
{
}
