use anyhow::Result;

use super::{report, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::{ApprovalStepId, UserId};
use crate::shutdown::ShutdownSignal;

pub struct ApproveCommand {
    pub fixture: FixtureArgs,
    pub step: ApprovalStepId,
    pub user: UserId,
}

impl Command for ApproveCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;
        let result = session.engine().advance(self.step, self.user).await;
        let ok = report(result)?;
        if ok {
            session.close().await?;
        }
        Ok(ok)
    }
}
