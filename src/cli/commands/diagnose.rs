use anyhow::Result;

use super::{print_json, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::{ApprovalStepId, DocumentId, UserId};
use crate::shutdown::ShutdownSignal;

/// What to diagnose: a live approval step or a document
#[derive(Debug, Clone, Copy)]
pub enum DiagnoseTarget {
    Step(ApprovalStepId),
    Document(DocumentId),
}

pub struct DiagnoseCommand {
    pub fixture: FixtureArgs,
    pub user: UserId,
    pub target: DiagnoseTarget,
}

impl Command for DiagnoseCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;
        let diagnostic = match self.target {
            DiagnoseTarget::Step(step) => session.engine().diagnose(step, self.user).await,
            DiagnoseTarget::Document(document) => {
                session.engine().diagnose_document(document, self.user).await
            }
        };
        print_json(&diagnostic)?;
        Ok(diagnostic.ok)
    }
}
