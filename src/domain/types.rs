use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use super::ids::*;

/// Monetary amount in minor currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub fn minor_units(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a role as it appears in configuration: by id or by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Id(RoleId),
    Name(String),
}

impl RoleRef {
    pub fn matches(&self, role: &Role) -> bool {
        match self {
            RoleRef::Id(id) => role.id == *id,
            RoleRef::Name(name) => role.name.eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for RoleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleRef::Id(id) => write!(f, "#{id}"),
            RoleRef::Name(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub roles: BTreeSet<RoleId>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One gate template: the role that must act, its coarse level and its
/// position in the total order of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStep {
    pub role: RoleId,
    pub role_name: String,
    pub level: u32,
    pub sequence: u32,
}

impl GateStep {
    pub fn new(role: RoleId, role_name: impl Into<String>, level: u32, sequence: u32) -> Self {
        Self {
            role,
            role_name: role_name.into(),
            level,
            sequence,
        }
    }

    /// Both forms the gate can be resolved by in the role directory
    pub fn role_refs(&self) -> Vec<RoleRef> {
        vec![RoleRef::Id(self.role), RoleRef::Name(self.role_name.clone())]
    }

    pub fn is_role(&self, role: &RoleRef) -> bool {
        match role {
            RoleRef::Id(id) => self.role == *id,
            RoleRef::Name(name) => self.role_name.eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for GateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (level {}, sequence {})",
            self.role_name, self.level, self.sequence
        )
    }
}

/// Links a case category to a document type and owns its gate templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTypeConfig {
    pub category: CategoryId,
    pub document_type: DocumentTypeId,
    pub name: String,
    #[serde(default)]
    pub ordering: u32,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub generated: bool,
    #[serde(default)]
    pub upload_required: bool,
    #[serde(default = "default_requires_approval")]
    pub requires_approval: bool,
    #[serde(default)]
    pub steps: Vec<GateStep>,
}

fn default_requires_approval() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    PendingApproval,
    Approved,
    Rejected,
    Replaced,
    Deleted,
}

impl DocumentStatus {
    /// No engine action applies to a document in a terminal status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DocumentStatus::Approved
                | DocumentStatus::Rejected
                | DocumentStatus::Replaced
                | DocumentStatus::Deleted
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::PendingApproval => "pending_approval",
            DocumentStatus::Approved => "approved",
            DocumentStatus::Rejected => "rejected",
            DocumentStatus::Replaced => "replaced",
            DocumentStatus::Deleted => "deleted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "uploaded" => Some(DocumentStatus::Uploaded),
            "pending_approval" => Some(DocumentStatus::PendingApproval),
            "approved" => Some(DocumentStatus::Approved),
            "rejected" => Some(DocumentStatus::Rejected),
            "replaced" => Some(DocumentStatus::Replaced),
            "deleted" => Some(DocumentStatus::Deleted),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentInstance {
    pub id: DocumentId,
    pub case: CaseId,
    pub category: CategoryId,
    pub document_type: DocumentTypeId,
    pub status: DocumentStatus,
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Approved,
    Rejected,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Approved => "approved",
            StepStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(StepStatus::Pending),
            "approved" => Some(StepStatus::Approved),
            "rejected" => Some(StepStatus::Rejected),
            _ => None,
        }
    }
}

/// The live per-document approval cursor. It names whose turn it is and is
/// rewritten in place as the document moves along its chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStepInstance {
    pub id: ApprovalStepId,
    pub document: DocumentId,
    pub case: CaseId,
    pub role: RoleId,
    pub role_name: String,
    pub level: u32,
    pub sequence: u32,
    pub status: StepStatus,
    pub approver: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub note: Option<String>,
    /// Incremented on every write; stores compare it before applying a change
    #[serde(default)]
    pub revision: u64,
}

impl ApprovalStepInstance {
    pub fn gate(&self) -> GateStep {
        GateStep::new(self.role, self.role_name.clone(), self.level, self.sequence)
    }

    /// Point the cursor at `gate` and clear everything an earlier actor left behind
    pub fn move_to(&mut self, gate: &GateStep) {
        self.role = gate.role;
        self.role_name = gate.role_name.clone();
        self.level = gate.level;
        self.sequence = gate.sequence;
        self.status = StepStatus::Pending;
        self.approver = None;
        self.approved_at = None;
        self.note = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approved,
    Rejected,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Approved => "approved",
            ActionKind::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approved" => Some(ActionKind::Approved),
            "rejected" => Some(ActionKind::Rejected),
            _ => None,
        }
    }
}

/// Immutable record of one approve or reject. Appended, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalAction {
    pub document: DocumentId,
    pub step: ApprovalStepId,
    pub actor: UserId,
    pub kind: ActionKind,
    pub role: RoleId,
    pub level: u32,
    pub sequence: u32,
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

/// Who rejected a document, when, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionDetail {
    pub actor: UserId,
    pub actor_name: Option<String>,
    pub at: DateTime<Utc>,
    pub note: Option<String>,
}

/// The acting user's latest action on a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAction {
    pub kind: ActionKind,
    pub level: u32,
    pub sequence: u32,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(!DocumentStatus::Uploaded.is_terminal());
        assert!(!DocumentStatus::PendingApproval.is_terminal());
        assert!(DocumentStatus::Approved.is_terminal());
        assert!(DocumentStatus::Rejected.is_terminal());
        assert!(DocumentStatus::Replaced.is_terminal());
        assert!(DocumentStatus::Deleted.is_terminal());
    }

    #[test]
    fn role_ref_deserializes_from_id_or_name() {
        #[derive(Deserialize)]
        struct Holder {
            role: RoleRef,
        }

        let by_id: Holder = toml::from_str("role = 3").unwrap();
        assert_eq!(by_id.role, RoleRef::Id(RoleId(3)));

        let by_name: Holder = toml::from_str("role = \"Director\"").unwrap();
        assert_eq!(by_name.role, RoleRef::Name("Director".to_string()));
    }

    #[test]
    fn gate_matches_role_by_id_or_case_insensitive_name() {
        let gate = GateStep::new(RoleId(9), "Director", 4, 4);
        assert!(gate.is_role(&RoleRef::Id(RoleId(9))));
        assert!(gate.is_role(&RoleRef::Name("director".to_string())));
        assert!(!gate.is_role(&RoleRef::Name("Manager".to_string())));
    }

    #[test]
    fn move_to_clears_previous_actor() {
        let mut step = ApprovalStepInstance {
            id: ApprovalStepId(1),
            document: DocumentId(1),
            case: CaseId(1),
            role: RoleId(1),
            role_name: "Analyst".to_string(),
            level: 1,
            sequence: 1,
            status: StepStatus::Approved,
            approver: Some(UserId(5)),
            approved_at: Some(Utc::now()),
            note: Some("ok".to_string()),
            revision: 3,
        };

        step.move_to(&GateStep::new(RoleId(2), "Manager", 2, 2));

        assert_eq!(step.role, RoleId(2));
        assert_eq!(step.sequence, 2);
        assert_eq!(step.status, StepStatus::Pending);
        assert!(step.approver.is_none());
        assert!(step.approved_at.is_none());
        assert!(step.note.is_none());
        assert_eq!(step.revision, 3);
    }
}
