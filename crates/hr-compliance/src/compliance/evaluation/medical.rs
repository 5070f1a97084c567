use super::super::domain::{AlertDraft, OriginRef, RuleType};
use super::policy::{medical_priority, plural_days};
use super::{EvaluationContext, EvaluationError, RuleEvaluator};

pub const MEDICAL_ORIGIN: &str = "medical_visit";

/// Window used when no medical-visit rule is configured. Not tied to the contract default.
pub const MEDICAL_VISIT_WINDOW_DAYS: u32 = 30;

/// Flags medical visits due within the window, including those already missed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MedicalVisitEvaluator;

impl RuleEvaluator for MedicalVisitEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::MedicalVisit
    }

    fn default_lookahead_days(&self, _configured: u32) -> u32 {
        MEDICAL_VISIT_WINDOW_DAYS
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<Vec<AlertDraft>, EvaluationError> {
        let mut subjects = context.source.active_subjects()?;
        subjects.retain(|subject| subject.active);
        subjects.sort_by(|a, b| a.id.cmp(&b.id));

        let mut drafts = Vec::new();
        for basis in context.bases() {
            let limit = context.horizon(&basis)?;

            for subject in &subjects {
                let Some(visit) = subject.medical_visit_due else { continue };
                if visit > limit {
                    continue;
                }

                let days_remaining = (visit - context.today).num_days();
                let (title, description) = if days_remaining < 0 {
                    (
                        format!("Medical visit expired: {}", subject.name),
                        format!(
                            "The medical visit of {} expired on {} ({} ago).",
                            subject.name,
                            visit,
                            plural_days(-days_remaining)
                        ),
                    )
                } else {
                    (
                        format!("Medical visit due: {}", subject.name),
                        format!(
                            "The medical visit of {} is due on {} ({} remaining).",
                            subject.name,
                            visit,
                            plural_days(days_remaining)
                        ),
                    )
                };

                drafts.push(AlertDraft {
                    alert_type: RuleType::MedicalVisit,
                    title,
                    description,
                    priority: medical_priority(days_remaining),
                    subject: Some(subject.id.clone()),
                    rule: basis.rule,
                    origin: Some(OriginRef::new(MEDICAL_ORIGIN, subject.id.0.clone())),
                    due_date: Some(visit),
                });
            }
        }

        Ok(drafts)
    }
}
