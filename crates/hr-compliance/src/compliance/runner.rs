use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::clock::Clock;

use super::alerts::{AlertError, AlertStore, CreateOutcome};
use super::domain::{Alert, AlertDraft, ComplianceRule, RuleId, RuleType};
use super::evaluation::{EvaluationContext, EvaluationError, EvaluatorRegistry};
use super::notification::{DispatchOutcome, NotificationDispatcher};
use super::repository::{AlertRepository, RuleRepository};
use super::rules::{RuleError, RuleStore};
use super::source::ComplianceSource;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComplianceError {
    #[error("no evaluator registered for rule type {0}")]
    UnsupportedRuleType(RuleType),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error(transparent)]
    Alerts(#[from] AlertError),
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Per-rule-type tally of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleTypeOutcome {
    pub drafts: usize,
    pub created: usize,
    pub duplicates: usize,
    pub notification_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub results: BTreeMap<RuleType, RuleTypeOutcome>,
}

impl RunReport {
    pub fn total_created(&self) -> usize {
        self.results.values().map(|outcome| outcome.created).sum()
    }

    pub fn failed_rule_types(&self) -> Vec<RuleType> {
        self.results
            .iter()
            .filter(|(_, outcome)| outcome.error.is_some())
            .map(|(rule_type, _)| *rule_type)
            .collect()
    }
}

/// Orchestrates evaluation, persistence and notification, one rule type at a time.
pub struct ComplianceRunner<RR, AR> {
    rules: Arc<RuleStore<RR>>,
    alerts: Arc<AlertStore<AR>>,
    evaluators: EvaluatorRegistry,
    source: Arc<dyn ComplianceSource>,
    notifier: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    default_lookahead_days: u32,
}

impl<RR, AR> ComplianceRunner<RR, AR>
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    pub fn new(
        rules: Arc<RuleStore<RR>>,
        alerts: Arc<AlertStore<AR>>,
        evaluators: EvaluatorRegistry,
        source: Arc<dyn ComplianceSource>,
        notifier: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        default_lookahead_days: u32,
    ) -> Self {
        Self {
            rules,
            alerts,
            evaluators,
            source,
            notifier,
            clock,
            default_lookahead_days,
        }
    }

    pub fn rules(&self) -> &RuleStore<RR> {
        &self.rules
    }

    pub fn alerts(&self) -> &AlertStore<AR> {
        &self.alerts
    }

    pub fn rule_types(&self) -> Vec<RuleType> {
        self.evaluators.rule_types()
    }

    /// Run every registered evaluator in registry order. A failing rule type is recorded
    /// in the report and the run moves on.
    pub async fn run_all(&self) -> RunReport {
        let started_at = self.clock.now();
        let mut results = BTreeMap::new();

        for rule_type in self.evaluators.rule_types() {
            let outcome = match self.run_one(rule_type).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(rule_type = %rule_type, error = %err, "rule type evaluation failed");
                    RuleTypeOutcome {
                        error: Some(err.to_string()),
                        ..RuleTypeOutcome::default()
                    }
                }
            };
            results.insert(rule_type, outcome);
        }

        let report = RunReport {
            started_at,
            results,
        };
        info!(
            created = report.total_created(),
            failed = report.failed_rule_types().len(),
            "compliance run finished"
        );
        report
    }

    pub async fn run_one(&self, rule_type: RuleType) -> Result<RuleTypeOutcome, ComplianceError> {
        let evaluator = self
            .evaluators
            .get(rule_type)
            .ok_or(ComplianceError::UnsupportedRuleType(rule_type))?;

        let rules = self.rules.active_rules_of_type(rule_type)?;
        let context = EvaluationContext {
            today: self.clock.today(),
            rules: &rules,
            default_lookahead_days: evaluator.default_lookahead_days(self.default_lookahead_days),
            source: self.source.as_ref(),
        };
        let drafts = evaluator.evaluate(&context)?;

        let mut outcome = RuleTypeOutcome {
            drafts: drafts.len(),
            ..RuleTypeOutcome::default()
        };
        for draft in drafts {
            match self.alerts.create_if_absent(draft)? {
                CreateOutcome::Created(alert) => {
                    outcome.created += 1;
                    let rule = alert
                        .rule
                        .and_then(|id| rules.iter().find(|rule| rule.id == id));
                    outcome.notification_failures += self.notify(&alert, rule).await;
                }
                CreateOutcome::Duplicate(_) => outcome.duplicates += 1,
            }
        }

        info!(
            rule_type = %rule_type,
            drafts = outcome.drafts,
            created = outcome.created,
            duplicates = outcome.duplicates,
            "rule type evaluated"
        );
        Ok(outcome)
    }

    /// Raise an alert outside a scheduled run (e.g. manually), through the same
    /// deduplication and notification path.
    pub async fn raise(&self, draft: AlertDraft) -> Result<CreateOutcome, ComplianceError> {
        let outcome = self.alerts.create_if_absent(draft)?;
        if let CreateOutcome::Created(alert) = &outcome {
            let rule = match alert.rule {
                Some(id) => self.rules.get(id).ok(),
                None => None,
            };
            self.notify(alert, rule.as_ref()).await;
        }
        Ok(outcome)
    }

    /// Delete a rule; alerts it raised stay, with their rule pointer cleared.
    pub fn retire_rule(&self, id: RuleId) -> Result<usize, ComplianceError> {
        let rule = self.rules.delete(id)?;
        let detached = self.alerts.detach_rule(rule.id)?;
        info!(code = %rule.code, detached, "compliance rule retired");
        Ok(detached)
    }

    /// Post-creation notifications. The alert is already persisted; every failure here is
    /// logged and counted, never propagated. Returns the number of failed deliveries.
    async fn notify(&self, alert: &Alert, rule: Option<&ComplianceRule>) -> usize {
        let mut failures = 0;

        if let Some(rule) = rule {
            match self.notifier.dispatch(alert, rule).await {
                Ok(DispatchOutcome::Sent { at, .. }) => {
                    if let Err(err) = self.alerts.mark_notified(&alert.reference, at) {
                        warn!(reference = %alert.reference, error = %err, "could not record notification");
                    }
                }
                Ok(DispatchOutcome::NoRecipients) => {}
                Err(err) => {
                    failures += 1;
                    warn!(
                        reference = %alert.reference,
                        rule = %rule.code,
                        error = %err,
                        "rule notification failed"
                    );
                }
            }
        }

        if let Err(err) = self.notifier.announce(alert).await {
            failures += 1;
            warn!(reference = %alert.reference, error = %err, "HR announcement failed");
        }

        failures
    }
}
