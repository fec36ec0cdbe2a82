use thiserror::Error;
use tracing::{error, warn};

use crate::chain::ChainError;
use crate::diagnostics::{Failure, ReasonCode};
use crate::store::StoreError;

/// Faults raised inside an engine operation before they are classified
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("Operation cancelled before any change was written")]
    Cancelled,
    #[error("{0}")]
    Contract(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl From<EngineError> for Failure {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(StoreError::NotFound { entity, id }) => {
                let code = match entity {
                    "approval step" => ReasonCode::ApprovalNotFound,
                    "document" => ReasonCode::DocumentNotFound,
                    _ => ReasonCode::Error,
                };
                Failure::new(code, format!("{entity} {id} not found"))
            }
            EngineError::Store(StoreError::Conflict { step, .. }) => {
                warn!(step_id = %step, "Approval step changed concurrently");
                Failure::new(
                    ReasonCode::Error,
                    format!("Approval step {step} changed concurrently; reload and retry"),
                )
            }
            EngineError::Store(StoreError::Backend { message }) => {
                error!(backend_error = %message, "Persistence failure during approval operation");
                Failure::new(
                    ReasonCode::Error,
                    "The approval store failed; no change was applied",
                )
            }
            EngineError::Chain(err) => Failure::new(ReasonCode::InvalidGateConfig, err.to_string()),
            EngineError::Cancelled => Failure::new(ReasonCode::Error, EngineError::Cancelled.to_string()),
            EngineError::Contract(message) => Failure::new(ReasonCode::Error, message),
        }
    }
}
