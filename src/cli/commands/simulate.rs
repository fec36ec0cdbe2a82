use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

use super::{print_json, Command, Session};
use crate::cli::FixtureArgs;
use crate::config::ApprovalChainConfig;
use crate::domain::{ApprovalStepId, ApprovalStepInstance, DocumentId, DocumentInstance, UserId};
use crate::shutdown::ShutdownSignal;

/// One scripted engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Send(DocumentId),
    Approve(ApprovalStepId, UserId),
    Reject(ApprovalStepId, UserId, Option<String>),
    Diagnose(ApprovalStepId, UserId),
}

impl FromStr for ScriptAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        let kind = parts.next().unwrap_or_default();
        let mut number = |what: &str| -> Result<u64, String> {
            parts
                .next()
                .ok_or_else(|| format!("'{s}' is missing the {what}"))?
                .trim()
                .parse::<u64>()
                .map_err(|e| format!("'{s}' has an invalid {what}: {e}"))
        };

        match kind {
            "send" => Ok(ScriptAction::Send(DocumentId(number("document id")?))),
            "approve" => {
                let step = ApprovalStepId(number("step id")?);
                Ok(ScriptAction::Approve(step, UserId(number("user id")?)))
            }
            "diagnose" => {
                let step = ApprovalStepId(number("step id")?);
                Ok(ScriptAction::Diagnose(step, UserId(number("user id")?)))
            }
            "reject" => {
                let step = ApprovalStepId(number("step id")?);
                let user = UserId(number("user id")?);
                let note = parts.next().map(str::to_string);
                Ok(ScriptAction::Reject(step, user, note))
            }
            other => Err(format!(
                "unknown action '{other}', expected send, approve, reject or diagnose"
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct StepResult {
    action: String,
    ok: bool,
    output: Value,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    steps: Vec<StepResult>,
    documents: Vec<DocumentInstance>,
    approval_steps: Vec<ApprovalStepInstance>,
}

pub struct SimulateCommand {
    pub fixture: FixtureArgs,
    pub actions: Vec<ScriptAction>,
}

impl SimulateCommand {
    async fn run_action(&self, session: &Session, action: &ScriptAction) -> Result<(bool, Value)> {
        let engine = session.engine();
        let (ok, output) = match action {
            ScriptAction::Send(document) => match engine.send_for_approval(*document).await {
                Ok(outcome) => (true, serde_json::to_value(outcome)?),
                Err(failure) => (false, serde_json::to_value(failure)?),
            },
            ScriptAction::Approve(step, user) => match engine.advance(*step, *user).await {
                Ok(outcome) => (true, serde_json::to_value(outcome)?),
                Err(failure) => (false, serde_json::to_value(failure)?),
            },
            ScriptAction::Reject(step, user, note) => {
                match engine.reject(*step, *user, note.clone()).await {
                    Ok(outcome) => (true, serde_json::to_value(outcome)?),
                    Err(failure) => (false, serde_json::to_value(failure)?),
                }
            }
            ScriptAction::Diagnose(step, user) => {
                let diagnostic = engine.diagnose(*step, *user).await;
                (diagnostic.ok, serde_json::to_value(diagnostic)?)
            }
        };
        Ok((ok, output))
    }
}

impl Command for SimulateCommand {
    /// Failed actions are recorded and the script continues
    async fn execute(
        &self,
        config: &ApprovalChainConfig,
        shutdown: &ShutdownSignal,
    ) -> Result<bool> {
        let session = Session::open(&self.fixture, config, shutdown)?;

        let mut steps = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            let (ok, output) = self.run_action(&session, action).await?;
            steps.push(StepResult {
                action: format!("{action:?}"),
                ok,
                output,
            });
        }

        let state = session.engine().store().snapshot().await;
        let all_ok = steps.iter().all(|s| s.ok);
        print_json(&SimulationReport {
            steps,
            documents: state.documents,
            approval_steps: state.steps,
        })?;

        session.close().await?;
        Ok(all_ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_script_actions() {
        assert_eq!(
            "send:30".parse::<ScriptAction>().unwrap(),
            ScriptAction::Send(DocumentId(30))
        );
        assert_eq!(
            "approve:1:10".parse::<ScriptAction>().unwrap(),
            ScriptAction::Approve(ApprovalStepId(1), UserId(10))
        );
        assert_eq!(
            "reject:1:10:totals do not add up: see page 2".parse::<ScriptAction>().unwrap(),
            ScriptAction::Reject(
                ApprovalStepId(1),
                UserId(10),
                Some("totals do not add up: see page 2".into())
            )
        );
    }

    #[test]
    fn rejects_malformed_actions() {
        assert!("approve:1".parse::<ScriptAction>().is_err());
        assert!("approve:x:1".parse::<ScriptAction>().is_err());
        assert!("publish:1".parse::<ScriptAction>().is_err());
    }
}
