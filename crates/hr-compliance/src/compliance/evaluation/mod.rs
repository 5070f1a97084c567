//! Rule evaluators: one strategy per rule type, each scanning a record snapshot and
//! emitting alert drafts. Duplicate suppression is not their concern.

mod contract;
mod document;
mod equipment;
mod medical;
mod policy;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::domain::{AlertDraft, ComplianceRule, RuleId, RuleType, Severity};
use super::source::{ComplianceSource, SourceError};

pub use contract::ContractExpiryEvaluator;
pub use document::MissingDocumentEvaluator;
pub use equipment::EquipmentOverdueEvaluator;
pub use medical::{MedicalVisitEvaluator, MEDICAL_VISIT_WINDOW_DAYS};
pub use policy::{contract_priority, equipment_priority, medical_priority};

/// Everything an evaluator may read during one run.
pub struct EvaluationContext<'a> {
    pub today: NaiveDate,
    /// Active rules of the evaluator's type, ordered by code.
    pub rules: &'a [ComplianceRule],
    pub default_lookahead_days: u32,
    pub source: &'a dyn ComplianceSource,
}

/// Threshold settings an evaluator applies, from a configured rule or the synthetic default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleBasis {
    pub rule: Option<RuleId>,
    pub code: Option<String>,
    pub lookahead_days: u32,
    pub severity: Severity,
}

impl<'a> EvaluationContext<'a> {
    /// One basis per configured rule, or a single ruleless default (WARNING) when none exist.
    pub fn bases(&self) -> Vec<RuleBasis> {
        if self.rules.is_empty() {
            return vec![RuleBasis {
                rule: None,
                code: None,
                lookahead_days: self.default_lookahead_days,
                severity: Severity::Warning,
            }];
        }

        self.rules
            .iter()
            .map(|rule| RuleBasis {
                rule: Some(rule.id),
                code: Some(rule.code.clone()),
                lookahead_days: rule.lookahead_days,
                severity: rule.severity,
            })
            .collect()
    }

    /// Last day inside the basis window.
    pub fn horizon(&self, basis: &RuleBasis) -> Result<NaiveDate, EvaluationError> {
        self.today
            .checked_add_signed(chrono::Duration::days(i64::from(basis.lookahead_days)))
            .ok_or_else(|| EvaluationError::HorizonOutOfRange {
                code: basis.code.clone().unwrap_or_else(|| "default".to_string()),
                lookahead_days: basis.lookahead_days,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("lookahead of {lookahead_days} days for rule {code} runs past the supported calendar")]
    HorizonOutOfRange { code: String, lookahead_days: u32 },
}

pub trait RuleEvaluator: Send + Sync {
    fn rule_type(&self) -> RuleType;

    /// Lookahead of the ruleless basis, given the configured default.
    fn default_lookahead_days(&self, configured: u32) -> u32 {
        configured
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<Vec<AlertDraft>, EvaluationError>;
}

/// Ordered set of evaluators, at most one per rule type.
#[derive(Clone, Default)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Arc<dyn RuleEvaluator>>,
}

impl EvaluatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Contract expiry, missing documents, medical visits, overdue equipment.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ContractExpiryEvaluator));
        registry.register(Arc::new(MissingDocumentEvaluator));
        registry.register(Arc::new(MedicalVisitEvaluator));
        registry.register(Arc::new(EquipmentOverdueEvaluator));
        registry
    }

    /// Add an evaluator, replacing any existing one for the same rule type in place.
    pub fn register(&mut self, evaluator: Arc<dyn RuleEvaluator>) {
        let rule_type = evaluator.rule_type();
        match self
            .evaluators
            .iter_mut()
            .find(|existing| existing.rule_type() == rule_type)
        {
            Some(slot) => *slot = evaluator,
            None => self.evaluators.push(evaluator),
        }
    }

    pub fn get(&self, rule_type: RuleType) -> Option<&Arc<dyn RuleEvaluator>> {
        self.evaluators
            .iter()
            .find(|evaluator| evaluator.rule_type() == rule_type)
    }

    pub fn rule_types(&self) -> Vec<RuleType> {
        self.evaluators
            .iter()
            .map(|evaluator| evaluator.rule_type())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RuleEvaluator>> {
        self.evaluators.iter()
    }
}
