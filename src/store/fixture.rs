use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::*;

/// Seed data for an [`InMemoryStore`](super::InMemoryStore), usually read from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub document_types: Vec<DocumentTypeConfig>,
    #[serde(default)]
    pub cases: Vec<CaseTotal>,
    #[serde(default)]
    pub documents: Vec<DocumentInstance>,
    #[serde(default)]
    pub steps: Vec<ApprovalStepInstance>,
    /// Action log, oldest first
    #[serde(default)]
    pub actions: Vec<ApprovalAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTotal {
    pub id: CaseId,
    pub total: Money,
}

impl Fixture {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid fixture TOML")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize fixture")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write fixture {}", path.display()))
    }
}
