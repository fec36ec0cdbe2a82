use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use approval_chain::cli::commands::approve::ApproveCommand;
use approval_chain::cli::commands::diagnose::{DiagnoseCommand, DiagnoseTarget};
#[cfg(feature = "database")]
use approval_chain::cli::commands::import::ImportCommand;
use approval_chain::cli::commands::reject::RejectCommand;
use approval_chain::cli::commands::resolve::ResolveCommand;
use approval_chain::cli::commands::send::{SendCommand, SendTarget};
use approval_chain::cli::commands::simulate::SimulateCommand;
use approval_chain::cli::commands::Command;
use approval_chain::cli::{Cli, Commands};
use approval_chain::domain::{ApprovalStepId, CaseId, DocumentId, UserId};
use approval_chain::{
    approval_metrics, init_telemetry, ApprovalChainConfig, ShutdownCoordinator, ShutdownSignal,
};

/// How long in-flight commits get to finish once shutdown is requested
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    ApprovalChainConfig::load_env_file()?;
    let config = match &cli.config {
        Some(path) => ApprovalChainConfig::load_from(path)?,
        None => approval_chain::config()?.clone(),
    };
    init_telemetry(&config.observability.log_level, config.observability.json)?;

    let ok = tokio::runtime::Runtime::new()?.block_on(async {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let ctrl_c = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.trigger_on_ctrl_c().await }
        });

        let result = run(cli.command, &config, &coordinator.signal()).await;

        ctrl_c.abort();
        approval_metrics().log_stats();
        coordinator.shutdown(SHUTDOWN_GRACE).await?;
        result
    })?;

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(2) })
}

async fn run(
    command: Commands,
    config: &ApprovalChainConfig,
    shutdown: &ShutdownSignal,
) -> Result<bool> {
    match command {
        Commands::Resolve { fixture, document } => {
            ResolveCommand {
                fixture,
                document: DocumentId(document),
            }
            .execute(config, shutdown)
            .await
        }
        Commands::Diagnose {
            fixture,
            user,
            step,
            document,
        } => {
            let target = match (step, document) {
                (Some(step), _) => DiagnoseTarget::Step(ApprovalStepId(step)),
                (None, Some(document)) => DiagnoseTarget::Document(DocumentId(document)),
                (None, None) => anyhow::bail!("diagnose needs --step or --document"),
            };
            DiagnoseCommand {
                fixture,
                user: UserId(user),
                target,
            }
            .execute(config, shutdown)
            .await
        }
        Commands::Approve {
            fixture,
            step,
            user,
        } => {
            ApproveCommand {
                fixture,
                step: ApprovalStepId(step),
                user: UserId(user),
            }
            .execute(config, shutdown)
            .await
        }
        Commands::Reject {
            fixture,
            step,
            user,
            note,
        } => {
            RejectCommand {
                fixture,
                step: ApprovalStepId(step),
                user: UserId(user),
                note,
            }
            .execute(config, shutdown)
            .await
        }
        Commands::Send {
            fixture,
            document,
            case,
        } => {
            let target = match (document, case) {
                (Some(document), _) => SendTarget::Document(DocumentId(document)),
                (None, Some(case)) => SendTarget::Case(CaseId(case)),
                (None, None) => anyhow::bail!("send needs --document or --case"),
            };
            SendCommand { fixture, target }
                .execute(config, shutdown)
                .await
        }
        #[cfg(feature = "database")]
        Commands::Import { fixture } => ImportCommand { fixture }.execute(config, shutdown).await,
        Commands::Simulate { fixture, actions } => {
            SimulateCommand { fixture, actions }
                .execute(config, shutdown)
                .await
        }
    }
}
