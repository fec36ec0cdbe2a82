use anyhow::Result;

use super::{report, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::{CaseId, DocumentId};
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Clone, Copy)]
pub enum SendTarget {
    Document(DocumentId),
    Case(CaseId),
}

pub struct SendCommand {
    pub fixture: FixtureArgs,
    pub target: SendTarget,
}

impl Command for SendCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;
        let ok = match self.target {
            SendTarget::Document(document) => {
                report(session.engine().send_for_approval(document).await)?
            }
            // A case report succeeds as a whole; per-document failures are listed inside
            SendTarget::Case(case) => {
                report(session.engine().send_case_for_approval(case).await)?
            }
        };
        if ok {
            session.close().await?;
        }
        Ok(ok)
    }
}
