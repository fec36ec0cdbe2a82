use anyhow::Result;

use super::{report, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::{ApprovalStepId, UserId};
use crate::shutdown::ShutdownSignal;

pub struct RejectCommand {
    pub fixture: FixtureArgs,
    pub step: ApprovalStepId,
    pub user: UserId,
    pub note: Option<String>,
}

impl Command for RejectCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;
        let result = session
            .engine()
            .reject(self.step, self.user, self.note.clone())
            .await;
        let ok = report(result)?;
        if ok {
            session.close().await?;
        }
        Ok(ok)
    }
}
