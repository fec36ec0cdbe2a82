//! Conditional gate rules
//!
//! A rule pairs a predicate over the document's business context with a
//! selector over gate steps. When the predicate holds, every selected step is
//! dropped from the effective chain. New conditional gates are added by
//! registering another rule with the [`ChainResolver`](super::ChainResolver).

use serde::{Deserialize, Serialize};

use crate::domain::{CaseId, DocumentId, GateStep, Money, RoleRef};

/// Business facts a rule may look at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    pub document: DocumentId,
    pub case: CaseId,
    /// Aggregate monetary total of the parent case
    pub case_total: Money,
}

impl ChainContext {
    pub fn new(document: DocumentId, case: CaseId, case_total: Money) -> Self {
        Self {
            document,
            case,
            case_total,
        }
    }
}

pub trait ChainRule: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Whether the rule is active for this document
    fn applies(&self, context: &ChainContext) -> bool;

    /// Whether the step is one this rule removes when active
    fn selects(&self, step: &GateStep) -> bool;
}

/// Drops the high-authority sign-off gate for cases whose total is at or
/// below the threshold. A total of exactly `threshold` skips the sign-off;
/// `threshold + 1` requires it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighAuthorityThresholdRule {
    pub threshold: Money,
    pub role: RoleRef,
}

impl HighAuthorityThresholdRule {
    pub fn new(threshold: Money, role: RoleRef) -> Self {
        Self { threshold, role }
    }
}

impl ChainRule for HighAuthorityThresholdRule {
    fn name(&self) -> &str {
        "high_authority_threshold"
    }

    fn applies(&self, context: &ChainContext) -> bool {
        context.case_total <= self.threshold
    }

    fn selects(&self, step: &GateStep) -> bool {
        step.is_role(&self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RoleId;

    fn context(total: i64) -> ChainContext {
        ChainContext::new(DocumentId(1), CaseId(1), Money(total))
    }

    #[test]
    fn threshold_rule_boundary() {
        let rule = HighAuthorityThresholdRule::new(Money(1_000), RoleRef::Name("Director".into()));

        assert!(rule.applies(&context(999)));
        assert!(rule.applies(&context(1_000)));
        assert!(!rule.applies(&context(1_001)));
    }

    #[test]
    fn threshold_rule_selects_only_the_sign_off_role() {
        let rule = HighAuthorityThresholdRule::new(Money(1_000), RoleRef::Id(RoleId(9)));

        assert!(rule.selects(&GateStep::new(RoleId(9), "Director", 4, 4)));
        assert!(!rule.selects(&GateStep::new(RoleId(3), "Manager", 3, 3)));
    }
}
