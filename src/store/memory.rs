// In-memory workflow store
// Backs tests and the CLI; one write lock per commit gives all-or-nothing writes

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

use super::fixture::CaseTotal;
use super::{
    ApprovalRepository, CaseLedger, DocumentRepository, Fixture, GateConfigStore, RoleDirectory,
    StoreError, TransitionCommit,
};
use crate::domain::*;

#[derive(Debug, Default)]
struct MemoryState {
    roles: BTreeMap<RoleId, Role>,
    users: BTreeMap<UserId, User>,
    configs: HashMap<(CategoryId, DocumentTypeId), DocumentTypeConfig>,
    documents: BTreeMap<DocumentId, DocumentInstance>,
    steps: BTreeMap<ApprovalStepId, ApprovalStepInstance>,
    actions: Vec<ApprovalAction>,
    case_totals: HashMap<CaseId, Money>,
    next_step_id: u64,
}

impl MemoryState {
    fn resolve_roles(&self, refs: &[RoleRef]) -> Vec<Role> {
        self.roles
            .values()
            .filter(|role| refs.iter().any(|r| r.matches(role)))
            .cloned()
            .collect()
    }

    fn allocate_step_id(&mut self) -> ApprovalStepId {
        self.next_step_id += 1;
        ApprovalStepId(self.next_step_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut state = MemoryState::default();
        for role in fixture.roles {
            state.roles.insert(role.id, role);
        }
        for user in fixture.users {
            state.users.insert(user.id, user);
        }
        for config in fixture.document_types {
            state
                .configs
                .insert((config.category, config.document_type), config);
        }
        for case in fixture.cases {
            state.case_totals.insert(case.id, case.total);
        }
        for document in fixture.documents {
            state.documents.insert(document.id, document);
        }
        for step in fixture.steps {
            state.next_step_id = state.next_step_id.max(step.id.0);
            state.steps.insert(step.id, step);
        }
        state.actions = fixture.actions;
        Self {
            state: RwLock::new(state),
        }
    }

    pub async fn insert_role(&self, role: Role) {
        self.state.write().await.roles.insert(role.id, role);
    }

    pub async fn remove_role(&self, id: RoleId) {
        self.state.write().await.roles.remove(&id);
    }

    pub async fn insert_user(&self, user: User) {
        self.state.write().await.users.insert(user.id, user);
    }

    pub async fn insert_document_type(&self, config: DocumentTypeConfig) {
        self.state
            .write()
            .await
            .configs
            .insert((config.category, config.document_type), config);
    }

    pub async fn insert_document(&self, document: DocumentInstance) {
        self.state
            .write()
            .await
            .documents
            .insert(document.id, document);
    }

    pub async fn set_case_total(&self, case: CaseId, total: Money) {
        self.state.write().await.case_totals.insert(case, total);
    }

    /// Overwrite a cursor row directly, bypassing revision checks
    pub async fn put_step(&self, step: ApprovalStepInstance) {
        let mut state = self.state.write().await;
        state.next_step_id = state.next_step_id.max(step.id.0);
        state.steps.insert(step.id, step);
    }

    /// Current contents as seed data, so a session can be saved and resumed
    pub async fn snapshot(&self) -> Fixture {
        let state = self.state.read().await;
        let mut document_types: Vec<DocumentTypeConfig> = state.configs.values().cloned().collect();
        document_types.sort_by_key(|c| (c.category, c.document_type));
        let mut cases: Vec<CaseTotal> = state
            .case_totals
            .iter()
            .map(|(id, total)| CaseTotal {
                id: *id,
                total: *total,
            })
            .collect();
        cases.sort_by_key(|c| c.id);

        Fixture {
            roles: state.roles.values().cloned().collect(),
            users: state.users.values().cloned().collect(),
            document_types,
            cases,
            documents: state.documents.values().cloned().collect(),
            steps: state.steps.values().cloned().collect(),
            actions: state.actions.clone(),
        }
    }

    /// Full action log for a document, oldest first
    pub async fn actions_for(&self, document: DocumentId) -> Vec<ApprovalAction> {
        self.state
            .read()
            .await
            .actions
            .iter()
            .filter(|action| action.document == document)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl GateConfigStore for InMemoryStore {
    async fn document_type_config(
        &self,
        category: CategoryId,
        document_type: DocumentTypeId,
    ) -> Result<Option<DocumentTypeConfig>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .configs
            .get(&(category, document_type))
            .cloned())
    }
}

#[async_trait]
impl RoleDirectory for InMemoryStore {
    async fn existing_roles(&self, refs: &[RoleRef]) -> Result<Vec<Role>, StoreError> {
        Ok(self.state.read().await.resolve_roles(refs))
    }

    async fn live_holder_count(&self, refs: &[RoleRef]) -> Result<usize, StoreError> {
        let state = self.state.read().await;
        let role_ids: Vec<RoleId> = state.resolve_roles(refs).iter().map(|r| r.id).collect();
        Ok(state
            .users
            .values()
            .filter(|user| user.active && role_ids.iter().any(|id| user.roles.contains(id)))
            .count())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }
}

#[async_trait]
impl DocumentRepository for InMemoryStore {
    async fn document(&self, id: DocumentId) -> Result<Option<DocumentInstance>, StoreError> {
        Ok(self.state.read().await.documents.get(&id).cloned())
    }

    async fn documents_for_case(&self, case: CaseId) -> Result<Vec<DocumentInstance>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .documents
            .values()
            .filter(|document| document.case == case)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ApprovalRepository for InMemoryStore {
    async fn step(&self, id: ApprovalStepId) -> Result<Option<ApprovalStepInstance>, StoreError> {
        Ok(self.state.read().await.steps.get(&id).cloned())
    }

    async fn step_for_document(
        &self,
        document: DocumentId,
    ) -> Result<Option<ApprovalStepInstance>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .steps
            .values()
            .find(|step| step.document == document)
            .cloned())
    }

    async fn steps_for_case(&self, case: CaseId) -> Result<Vec<ApprovalStepInstance>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .steps
            .values()
            .filter(|step| step.case == case)
            .cloned()
            .collect())
    }

    async fn last_rejection(
        &self,
        document: DocumentId,
    ) -> Result<Option<RejectionDetail>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .actions
            .iter()
            .rev()
            .find(|action| action.document == document && action.kind == ActionKind::Rejected)
            .map(|action| RejectionDetail {
                actor: action.actor,
                actor_name: state.users.get(&action.actor).map(|u| u.name.clone()),
                at: action.at,
                note: action.note.clone(),
            }))
    }

    async fn last_action_by_user(
        &self,
        user: UserId,
        document: DocumentId,
    ) -> Result<Option<UserAction>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .actions
            .iter()
            .rev()
            .find(|action| action.document == document && action.actor == user)
            .map(|action| UserAction {
                kind: action.kind,
                level: action.level,
                sequence: action.sequence,
                at: action.at,
            }))
    }

    async fn open_review(
        &self,
        document: DocumentId,
        first_gate: GateStep,
    ) -> Result<ApprovalStepInstance, StoreError> {
        let mut state = self.state.write().await;

        let case = state
            .documents
            .get(&document)
            .map(|d| d.case)
            .ok_or_else(|| StoreError::not_found("document", document))?;

        let existing = state
            .steps
            .values()
            .find(|step| step.document == document)
            .map(|step| step.id);

        let step = match existing {
            Some(id) => {
                let step = state
                    .steps
                    .get_mut(&id)
                    .ok_or_else(|| StoreError::not_found("approval step", id))?;
                step.move_to(&first_gate);
                step.revision += 1;
                step.clone()
            }
            None => {
                let id = state.allocate_step_id();
                let step = ApprovalStepInstance {
                    id,
                    document,
                    case,
                    role: first_gate.role,
                    role_name: first_gate.role_name.clone(),
                    level: first_gate.level,
                    sequence: first_gate.sequence,
                    status: StepStatus::Pending,
                    approver: None,
                    approved_at: None,
                    note: None,
                    revision: 0,
                };
                state.steps.insert(id, step.clone());
                step
            }
        };

        if let Some(doc) = state.documents.get_mut(&document) {
            doc.status = DocumentStatus::PendingApproval;
            doc.approved = false;
            doc.approved_at = None;
        }

        debug!(document_id = %document, step_id = %step.id, "Review opened");
        Ok(step)
    }

    async fn commit_transition(&self, commit: TransitionCommit) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        let stored = state
            .steps
            .get(&commit.step.id)
            .ok_or_else(|| StoreError::not_found("approval step", commit.step.id))?;

        if stored.revision != commit.expected_revision {
            return Err(StoreError::Conflict {
                step: commit.step.id,
                expected: commit.expected_revision,
                found: stored.revision,
            });
        }

        if let Some(document) = &commit.document {
            if !state.documents.contains_key(&document.id) {
                return Err(StoreError::not_found("document", document.id));
            }
        }

        let mut step = commit.step;
        step.revision = commit.expected_revision + 1;
        state.steps.insert(step.id, step);

        if let Some(document) = commit.document {
            state.documents.insert(document.id, document);
        }
        state.actions.push(commit.action);

        Ok(())
    }
}

#[async_trait]
impl CaseLedger for InMemoryStore {
    async fn case_total(&self, case: CaseId) -> Result<Money, StoreError> {
        self.state
            .read()
            .await
            .case_totals
            .get(&case)
            .copied()
            .ok_or_else(|| StoreError::not_found("case", case))
    }
}
