use super::super::domain::{AlertDraft, OriginRef, RuleType};
use super::policy::{equipment_priority, plural_days};
use super::{EvaluationContext, EvaluationError, RuleEvaluator};

pub const EQUIPMENT_ORIGIN: &str = "equipment_loan";

/// Flags unreturned equipment whose expected return date has passed.
#[derive(Debug, Default, Clone, Copy)]
pub struct EquipmentOverdueEvaluator;

impl RuleEvaluator for EquipmentOverdueEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::Equipment
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<Vec<AlertDraft>, EvaluationError> {
        let mut loans = context.source.equipment_loans()?;
        loans.retain(|loan| loan.active && !loan.returned);
        loans.sort_by(|a, b| {
            a.expected_return
                .cmp(&b.expected_return)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut drafts = Vec::new();
        for basis in context.bases() {
            for loan in &loans {
                let Some(expected) = loan.expected_return else { continue };
                if expected >= context.today {
                    continue;
                }

                let days_overdue = (context.today - expected).num_days();
                drafts.push(AlertDraft {
                    alert_type: RuleType::Equipment,
                    title: format!("Equipment not returned: {}", loan.equipment),
                    description: format!(
                        "{} was lent to {} on {} and was due back on {} ({} overdue).",
                        loan.equipment,
                        loan.subject_name,
                        loan.loaned_on,
                        expected,
                        plural_days(days_overdue)
                    ),
                    priority: equipment_priority(days_overdue),
                    subject: Some(loan.subject.clone()),
                    rule: basis.rule,
                    origin: Some(OriginRef::new(EQUIPMENT_ORIGIN, loan.id.clone())),
                    due_date: Some(expected),
                });
            }
        }

        Ok(drafts)
    }
}
