use anyhow::{bail, Result};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use super::{print_json, Command};
use crate::config::ApprovalChainConfig;
use crate::database::init_database;
use crate::shutdown::ShutdownSignal;
use crate::store::Fixture;

/// Load a fixture, including its action log, into the configured database
pub struct ImportCommand {
    pub fixture: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportSummary {
    database: String,
    documents: usize,
    steps: usize,
    actions: usize,
}

impl Command for ImportCommand {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let Some(store) = init_database(config).await? else {
            bail!("import needs a [database] section in the configuration");
        };
        let fixture = Fixture::load(&self.fixture)?;

        if shutdown.is_cancelled() {
            store.shutdown().await;
            return Ok(false);
        }
        store.import_fixture(&fixture).await?;
        store.shutdown().await;
        info!(fixture = %self.fixture.display(), "Fixture imported into the database");

        print_json(&ImportSummary {
            database: config
                .database
                .as_ref()
                .map(|db| db.url.clone())
                .unwrap_or_default(),
            documents: fixture.documents.len(),
            steps: fixture.steps.len(),
            actions: fixture.actions.len(),
        })?;
        Ok(true)
    }
}
