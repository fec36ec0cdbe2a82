// Validation & diagnostics - classifies whether an actor may act on the current gate

pub mod checks;
pub mod facts;
pub mod types;

pub use checks::{evaluate, EligibilityFacts, CASCADE};
pub use facts::gather_facts;
pub use types::{Diagnostic, Failure, ReasonCode};
