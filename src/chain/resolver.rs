use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use super::rules::{ChainContext, ChainRule, HighAuthorityThresholdRule};
use crate::domain::{
    CategoryId, DocumentTypeConfig, DocumentTypeId, GateStep, Money, RoleId, RoleRef,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No gate configuration for category {category}, document type {document_type}")]
    MissingConfig {
        category: CategoryId,
        document_type: DocumentTypeId,
    },
    #[error("Gate chain for category {category}, document type {document_type} is empty after filtering")]
    Empty {
        category: CategoryId,
        document_type: DocumentTypeId,
    },
    #[error("Sequence order {sequence} is configured more than once for document type {document_type}")]
    DuplicateSequence {
        document_type: DocumentTypeId,
        sequence: u32,
    },
}

/// Ordered, filtered gates for one concrete document.
///
/// Never empty. Sequence orders strictly increase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectiveChain {
    gates: Vec<GateStep>,
}

impl EffectiveChain {
    pub fn gates(&self) -> &[GateStep] {
        &self.gates
    }

    pub fn len(&self) -> usize {
        self.gates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&GateStep> {
        self.gates.get(index)
    }

    pub fn first(&self) -> &GateStep {
        &self.gates[0]
    }

    pub fn last_index(&self) -> usize {
        self.gates.len() - 1
    }

    /// Index of the gate matching both role and sequence order
    pub fn position_of(&self, role: RoleId, sequence: u32) -> Option<usize> {
        self.gates
            .iter()
            .position(|gate| gate.role == role && gate.sequence == sequence)
    }

    pub fn contains_any_role(&self, roles: &BTreeSet<RoleId>) -> bool {
        self.gates.iter().any(|gate| roles.contains(&gate.role))
    }

    /// Distinct roles in chain order
    pub fn required_roles(&self) -> Vec<RoleId> {
        let mut seen = BTreeSet::new();
        self.gates
            .iter()
            .filter(|gate| seen.insert(gate.role))
            .map(|gate| gate.role)
            .collect()
    }
}

/// Applies registered [`ChainRule`]s to a document type's gate templates
#[derive(Default)]
pub struct ChainResolver {
    rules: Vec<Box<dyn ChainRule>>,
}

impl std::fmt::Debug for ChainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainResolver")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl ChainResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with the monetary sign-off rule registered
    pub fn standard(threshold: Money, high_authority_role: RoleRef) -> Self {
        Self::new().with_rule(HighAuthorityThresholdRule::new(threshold, high_authority_role))
    }

    pub fn with_rule(mut self, rule: impl ChainRule + 'static) -> Self {
        self.register(Box::new(rule));
        self
    }

    pub fn register(&mut self, rule: Box<dyn ChainRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|rule| rule.name()).collect()
    }

    pub fn resolve(
        &self,
        config: &DocumentTypeConfig,
        context: &ChainContext,
    ) -> Result<EffectiveChain, ChainError> {
        let mut template = config.steps.clone();
        template.sort_by_key(|step| step.sequence);

        if let Some(pair) = template.windows(2).find(|pair| pair[0].sequence == pair[1].sequence) {
            return Err(ChainError::DuplicateSequence {
                document_type: config.document_type,
                sequence: pair[0].sequence,
            });
        }

        let active: Vec<&dyn ChainRule> = self
            .rules
            .iter()
            .map(|rule| &**rule)
            .filter(|rule| rule.applies(context))
            .collect();

        let gates: Vec<GateStep> = template
            .into_iter()
            .filter(|step| match active.iter().find(|rule| rule.selects(step)) {
                Some(rule) => {
                    debug!(
                        document_id = %context.document,
                        rule = rule.name(),
                        role = %step.role_name,
                        sequence = step.sequence,
                        "Gate dropped by chain rule"
                    );
                    false
                }
                None => true,
            })
            .collect();

        if gates.is_empty() {
            return Err(ChainError::Empty {
                category: config.category,
                document_type: config.document_type,
            });
        }

        Ok(EffectiveChain { gates })
    }
}
