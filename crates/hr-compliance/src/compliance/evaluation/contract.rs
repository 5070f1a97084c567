use super::super::domain::{AlertDraft, OriginRef, RuleType};
use super::policy::{contract_priority, plural_days};
use super::{EvaluationContext, EvaluationError, RuleEvaluator};

pub const CONTRACT_ORIGIN: &str = "contract";

/// Flags active contracts whose end date falls inside the lookahead window.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContractExpiryEvaluator;

impl RuleEvaluator for ContractExpiryEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::Contract
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<Vec<AlertDraft>, EvaluationError> {
        let mut contracts = context.source.active_contracts()?;
        contracts.sort_by(|a, b| a.end.cmp(&b.end).then_with(|| a.id.cmp(&b.id)));

        let mut drafts = Vec::new();
        for basis in context.bases() {
            let limit = context.horizon(&basis)?;

            for contract in contracts.iter().filter(|contract| contract.active) {
                let Some(end) = contract.end else { continue };
                if end < context.today || end > limit {
                    continue;
                }

                let days_remaining = (end - context.today).num_days();
                drafts.push(AlertDraft {
                    alert_type: RuleType::Contract,
                    title: format!("Contract ending soon: {}", contract.subject_name),
                    description: format!(
                        "The {} contract of {} ends on {} ({} remaining).",
                        contract.label,
                        contract.subject_name,
                        end,
                        plural_days(days_remaining)
                    ),
                    priority: contract_priority(days_remaining),
                    subject: Some(contract.subject.clone()),
                    rule: basis.rule,
                    origin: Some(OriginRef::new(CONTRACT_ORIGIN, contract.id.clone())),
                    due_date: Some(end),
                });
            }
        }

        Ok(drafts)
    }
}
