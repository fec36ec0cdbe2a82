use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::diagnostics::Failure;
use crate::engine::ApprovalEngine;
use crate::shutdown::ShutdownSignal;
use crate::store::{Fixture, InMemoryStore};

pub mod approve;
pub mod diagnose;
#[cfg(feature = "database")]
pub mod import;
pub mod reject;
pub mod resolve;
pub mod send;
pub mod simulate;

pub use simulate::ScriptAction;

/// A CLI command. Returns whether the requested operation succeeded.
#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool>;
}

/// Engine over a fixture-backed in-memory store
pub struct Session {
    engine: ApprovalEngine<InMemoryStore>,
    args: FixtureArgs,
}

impl Session {
    pub fn open(
        args: &FixtureArgs,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<Self> {
        let fixture = Fixture::load(&args.fixture)?;
        let store = Arc::new(InMemoryStore::from_fixture(fixture));
        Ok(Self {
            engine: ApprovalEngine::from_config(store, config).with_shutdown(shutdown.clone()),
            args: args.clone(),
        })
    }

    pub fn engine(&self) -> &ApprovalEngine<InMemoryStore> {
        &self.engine
    }

    /// Write the store back to the fixture file when `--save` was given
    pub async fn close(self) -> Result<()> {
        if self.args.save {
            self.engine.store().snapshot().await.save(&self.args.fixture)?;
            info!(fixture = %self.args.fixture.display(), "Fixture updated");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CommandOutput<T> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<Failure>,
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an operation result as JSON and report whether it succeeded
pub fn report<T: Serialize>(result: Result<T, Failure>) -> Result<bool> {
    let output = match result {
        Ok(value) => CommandOutput {
            ok: true,
            result: Some(value),
            failure: None,
        },
        Err(failure) => CommandOutput {
            ok: false,
            result: None,
            failure: Some(failure),
        },
    };
    print_json(&output)?;
    Ok(output.ok)
}
