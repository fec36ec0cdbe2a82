// Approval Chain Library - multi-level, role-gated document approval
// This exposes the engine, its collaborator traits and the CLI for testing and integration

pub mod chain;
pub mod cli;
pub mod config;
pub mod database;
pub mod diagnostics;
pub mod domain;
pub mod engine;
pub mod error;
pub mod observability;
pub mod shutdown;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use chain::{ChainContext, ChainError, ChainResolver, ChainRule, EffectiveChain, HighAuthorityThresholdRule};
pub use config::{config, ApprovalChainConfig};
pub use diagnostics::{Diagnostic, Failure, ReasonCode};
pub use engine::{AdvanceOutcome, ApprovalEngine, CaseSendReport, RejectOutcome, SendOutcome};
pub use error::EngineError;
pub use observability::{approval_metrics, ApprovalMetrics, OperationTimer};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};
pub use store::{Fixture, InMemoryStore, StoreError, WorkflowStore};
pub use telemetry::{create_approval_span, generate_correlation_id, init_telemetry};

#[cfg(feature = "database")]
pub use database::SqliteStore;
