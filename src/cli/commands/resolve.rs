use anyhow::Result;

use super::{report, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::DocumentId;
use crate::shutdown::ShutdownSignal;

pub struct ResolveCommand {
    pub fixture: FixtureArgs,
    pub document: DocumentId,
}

impl Command for ResolveCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;
        let result = session.engine().resolve_chain(self.document).await;
        report(result)
    }
}
