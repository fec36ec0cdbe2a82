mod fixtures;

use approval_chain::diagnostics::ReasonCode;
use approval_chain::domain::*;
use fixtures::*;

#[tokio::test]
async fn rejection_at_second_gate_finalizes_the_document() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;
    scenario.engine.advance(step, ANA).await.unwrap();

    let outcome = scenario
        .engine
        .reject(step, SAM, Some("Totals do not match the invoice".into()))
        .await
        .unwrap();
    assert_eq!(outcome.rejected_by, SAM);
    assert_eq!(outcome.note.as_deref(), Some("Totals do not match the invoice"));

    let document = scenario.document(SMALL_CONTRACT).await;
    assert_eq!(document.status, DocumentStatus::Rejected);
    assert!(!document.approved);
    assert_eq!(document.approved_at, None);

    let cursor = scenario.step(step).await;
    assert_eq!(cursor.status, StepStatus::Rejected);
    assert_eq!(cursor.role, ASST_MANAGER);
    assert_eq!(cursor.approver, Some(SAM));
    assert_eq!(cursor.approved_at, Some(outcome.rejected_at));
}

#[tokio::test]
async fn later_gates_see_who_rejected_and_why() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;
    scenario.engine.advance(step, ANA).await.unwrap();
    scenario
        .engine
        .reject(step, SAM, Some("Missing signature".into()))
        .await
        .unwrap();

    let failure = scenario.engine.advance(step, MIRA).await.unwrap_err();
    assert_eq!(failure.code, ReasonCode::AlreadyRejected);
    let detail = failure.rejection().expect("rejection detail attached");
    assert_eq!(detail.actor, SAM);
    assert_eq!(detail.actor_name.as_deref(), Some("sam"));
    assert_eq!(detail.note.as_deref(), Some("Missing signature"));
    assert!(failure.message.contains("Missing signature"));

    let again = scenario.engine.reject(step, SAM, None).await.unwrap_err();
    assert_eq!(again.code, ReasonCode::AlreadyRejected);
}

#[tokio::test]
async fn blank_note_is_stored_as_absent() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;

    let outcome = scenario
        .engine
        .reject(step, ANA, Some("   ".into()))
        .await
        .unwrap();

    assert_eq!(outcome.note, None);
    assert_eq!(scenario.step(step).await.note, None);
    let actions = scenario.store.actions_for(SMALL_CONTRACT).await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].kind, ActionKind::Rejected);
    assert_eq!(actions[0].note, None);
}

#[tokio::test]
async fn only_the_current_gate_may_reject() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;

    let later_gate = scenario.engine.reject(step, MIRA, None).await.unwrap_err();
    assert_eq!(later_gate.code, ReasonCode::NotYourTurn);

    let outsider = scenario.engine.reject(step, OLLIE, None).await.unwrap_err();
    assert_eq!(outsider.code, ReasonCode::RoleNotInGate);

    assert_eq!(
        scenario.document(SMALL_CONTRACT).await.status,
        DocumentStatus::PendingApproval
    );
    assert!(scenario.store.actions_for(SMALL_CONTRACT).await.is_empty());
}

#[tokio::test]
async fn rejected_document_cannot_be_sent_again() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;
    scenario.engine.advance(step, ANA).await.unwrap();
    scenario.engine.reject(step, SAM, Some("Wrong vendor".into())).await.unwrap();
    let before = scenario.step(step).await;

    let failure = scenario
        .engine
        .send_for_approval(SMALL_CONTRACT)
        .await
        .unwrap_err();
    assert_eq!(failure.code, ReasonCode::AlreadyRejected);
    let detail = failure.rejection().expect("rejection detail attached");
    assert_eq!(detail.actor, SAM);
    assert_eq!(detail.note.as_deref(), Some("Wrong vendor"));

    // Neither the cursor nor the document moves
    assert_eq!(scenario.step(step).await, before);
    assert_eq!(
        scenario.document(SMALL_CONTRACT).await.status,
        DocumentStatus::Rejected
    );
    let kinds: Vec<ActionKind> = scenario
        .store
        .actions_for(SMALL_CONTRACT)
        .await
        .iter()
        .map(|a| a.kind)
        .collect();
    assert_eq!(kinds, vec![ActionKind::Approved, ActionKind::Rejected]);
}

#[tokio::test]
async fn case_send_skips_rejected_documents() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;
    scenario.engine.reject(step, ANA, None).await.unwrap();

    let report = scenario
        .engine
        .send_case_for_approval(SMALL_CASE)
        .await
        .unwrap();

    let sent: Vec<DocumentId> = report.sent.iter().map(|s| s.document).collect();
    assert_eq!(sent, vec![SMALL_ADDENDUM]);
    assert!(report.skipped.contains(&SMALL_CONTRACT));
    assert!(report.failed.is_empty());
    assert_eq!(
        scenario.document(SMALL_CONTRACT).await.status,
        DocumentStatus::Rejected
    );
}

#[tokio::test]
async fn holder_can_reject_when_chain_no_longer_resolves() {
    let scenario = Scenario::new();
    let step = scenario.send(SMALL_CONTRACT).await;

    // Duplicate sequence orders make the chain unresolvable
    let mut broken = contract_type();
    broken.steps.push(GateStep::new(AUDITOR, "Auditor", 5, 1));
    scenario.store.insert_document_type(broken).await;

    let failure = scenario.engine.advance(step, ANA).await.unwrap_err();
    assert_eq!(failure.code, ReasonCode::InvalidGateConfig);

    scenario
        .engine
        .reject(step, ANA, Some("Configuration is being fixed".into()))
        .await
        .unwrap();
    assert_eq!(
        scenario.document(SMALL_CONTRACT).await.status,
        DocumentStatus::Rejected
    );
}
