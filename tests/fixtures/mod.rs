//! Shared scenario for integration tests
//!
//! One category with a four-gate contract template: Analyst, AsstManager,
//! Manager and the Director sign-off. Case 1 sits below the sign-off
//! threshold, case 2 above it. An Auditor role exists but appears in no chain.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use approval_chain::chain::ChainResolver;
use approval_chain::domain::*;
use approval_chain::engine::ApprovalEngine;
use approval_chain::store::{ApprovalRepository, CaseTotal, DocumentRepository, Fixture, InMemoryStore};

pub const ANALYST: RoleId = RoleId(1);
pub const ASST_MANAGER: RoleId = RoleId(2);
pub const MANAGER: RoleId = RoleId(3);
pub const DIRECTOR: RoleId = RoleId(4);
pub const AUDITOR: RoleId = RoleId(5);

pub const ANA: UserId = UserId(10);
pub const SAM: UserId = UserId(11);
pub const MIRA: UserId = UserId(12);
pub const DREW: UserId = UserId(13);
pub const OLLIE: UserId = UserId(14);
pub const NOBODY: UserId = UserId(99);

pub const CATEGORY: CategoryId = CategoryId(1);
pub const CONTRACT: DocumentTypeId = DocumentTypeId(1);
pub const RECEIPT: DocumentTypeId = DocumentTypeId(2);

pub const SMALL_CASE: CaseId = CaseId(1);
pub const LARGE_CASE: CaseId = CaseId(2);

/// Contract in the small case
pub const SMALL_CONTRACT: DocumentId = DocumentId(100);
/// Second contract in the small case
pub const SMALL_ADDENDUM: DocumentId = DocumentId(101);
/// Receipt in the small case; its type needs no approval
pub const SMALL_RECEIPT: DocumentId = DocumentId(102);
/// Contract in the large case
pub const LARGE_CONTRACT: DocumentId = DocumentId(200);

pub const THRESHOLD: i64 = 1_000;

pub fn role(id: RoleId, name: &str) -> Role {
    Role {
        id,
        name: name.to_string(),
    }
}

pub fn user(id: UserId, name: &str, roles: &[RoleId]) -> User {
    User {
        id,
        name: name.to_string(),
        roles: roles.iter().copied().collect(),
        active: true,
    }
}

pub fn document(id: DocumentId, case: CaseId, document_type: DocumentTypeId) -> DocumentInstance {
    DocumentInstance {
        id,
        case,
        category: CATEGORY,
        document_type,
        status: DocumentStatus::Uploaded,
        approved: false,
        approved_at: None,
    }
}

pub fn contract_type() -> DocumentTypeConfig {
    DocumentTypeConfig {
        category: CATEGORY,
        document_type: CONTRACT,
        name: "Purchase contract".to_string(),
        ordering: 1,
        mandatory: true,
        generated: false,
        upload_required: true,
        requires_approval: true,
        steps: vec![
            GateStep::new(ANALYST, "Analyst", 1, 1),
            GateStep::new(ASST_MANAGER, "AsstManager", 2, 2),
            GateStep::new(MANAGER, "Manager", 3, 3),
            GateStep::new(DIRECTOR, "Director", 4, 4),
        ],
    }
}

pub fn receipt_type() -> DocumentTypeConfig {
    DocumentTypeConfig {
        category: CATEGORY,
        document_type: RECEIPT,
        name: "Receipt".to_string(),
        ordering: 2,
        mandatory: false,
        generated: false,
        upload_required: true,
        requires_approval: false,
        steps: Vec::new(),
    }
}

pub fn scenario_fixture() -> Fixture {
    Fixture {
        roles: vec![
            role(ANALYST, "Analyst"),
            role(ASST_MANAGER, "AsstManager"),
            role(MANAGER, "Manager"),
            role(DIRECTOR, "Director"),
            role(AUDITOR, "Auditor"),
        ],
        users: vec![
            user(ANA, "ana", &[ANALYST]),
            user(SAM, "sam", &[ASST_MANAGER]),
            user(MIRA, "mira", &[MANAGER]),
            user(DREW, "drew", &[DIRECTOR]),
            user(OLLIE, "ollie", &[AUDITOR]),
        ],
        document_types: vec![contract_type(), receipt_type()],
        cases: vec![
            CaseTotal {
                id: SMALL_CASE,
                total: Money(THRESHOLD - 500),
            },
            CaseTotal {
                id: LARGE_CASE,
                total: Money(THRESHOLD * 5),
            },
        ],
        documents: vec![
            document(SMALL_CONTRACT, SMALL_CASE, CONTRACT),
            document(SMALL_ADDENDUM, SMALL_CASE, CONTRACT),
            document(SMALL_RECEIPT, SMALL_CASE, RECEIPT),
            document(LARGE_CONTRACT, LARGE_CASE, CONTRACT),
        ],
        steps: Vec::new(),
        actions: Vec::new(),
    }
}

pub fn resolver() -> ChainResolver {
    ChainResolver::standard(Money(THRESHOLD), RoleRef::Name("Director".to_string()))
}

pub struct Scenario {
    pub store: Arc<InMemoryStore>,
    pub engine: ApprovalEngine<InMemoryStore>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::from_fixture(scenario_fixture())
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let store = Arc::new(InMemoryStore::from_fixture(fixture));
        let engine = ApprovalEngine::new(store.clone(), resolver());
        Self { store, engine }
    }

    /// Send a document for approval and return its cursor id
    pub async fn send(&self, document: DocumentId) -> ApprovalStepId {
        self.engine
            .send_for_approval(document)
            .await
            .expect("document should be sendable")
            .step
    }

    pub async fn document(&self, id: DocumentId) -> DocumentInstance {
        self.store
            .document(id)
            .await
            .unwrap()
            .expect("document exists")
    }

    pub async fn step(&self, id: ApprovalStepId) -> ApprovalStepInstance {
        self.store.step(id).await.unwrap().expect("step exists")
    }
}

/// Write the scenario as a TOML fixture into `dir`
pub fn write_fixture(dir: &Path) -> PathBuf {
    let path = dir.join("fixture.toml");
    scenario_fixture().save(&path).expect("fixture written");
    path
}
