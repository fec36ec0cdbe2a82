// Domain model for role-gated document approval
// Identifiers, gate templates, document instances and the live approval cursor

pub mod ids;
pub mod types;

pub use ids::{
    ApprovalStepId, CaseId, CategoryId, DocumentId, DocumentTypeId, RoleId, UserId,
};
pub use types::{
    ActionKind, ApprovalAction, ApprovalStepInstance, DocumentInstance, DocumentStatus,
    DocumentTypeConfig, GateStep, Money, RejectionDetail, Role, RoleRef, StepStatus, User,
    UserAction,
};
