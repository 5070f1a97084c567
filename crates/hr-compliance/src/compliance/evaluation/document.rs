use std::collections::BTreeSet;

use super::super::domain::{AlertDraft, OriginRef, Priority, RuleType};
use super::super::source::DocumentKind;
use super::{EvaluationContext, EvaluationError, RuleEvaluator};

pub const DOCUMENT_ORIGIN: &str = "document_requirement";

/// Flags active employees lacking a verified copy of a mandatory document.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingDocumentEvaluator;

impl RuleEvaluator for MissingDocumentEvaluator {
    fn rule_type(&self) -> RuleType {
        RuleType::Document
    }

    fn evaluate(&self, context: &EvaluationContext<'_>) -> Result<Vec<AlertDraft>, EvaluationError> {
        let mut subjects = context.source.active_subjects()?;
        subjects.retain(|subject| subject.active);
        subjects.sort_by(|a, b| a.id.cmp(&b.id));

        let bases = context.bases();
        let mut drafts = Vec::new();

        for subject in &subjects {
            let verified: BTreeSet<DocumentKind> = context
                .source
                .documents_for(&subject.id)?
                .into_iter()
                .filter(|document| document.verified)
                .map(|document| document.kind)
                .collect();

            for kind in DocumentKind::mandatory() {
                if verified.contains(&kind) {
                    continue;
                }

                for basis in &bases {
                    drafts.push(AlertDraft {
                        alert_type: RuleType::Document,
                        title: format!("Missing {}: {}", kind.label(), subject.name),
                        description: format!(
                            "{} has no verified {} on file.",
                            subject.name,
                            kind.label()
                        ),
                        priority: Priority::Medium,
                        subject: Some(subject.id.clone()),
                        rule: basis.rule,
                        origin: Some(OriginRef::new(
                            DOCUMENT_ORIGIN,
                            format!("{}:{}", subject.id, kind.code()),
                        )),
                        due_date: None,
                    });
                }
            }
        }

        Ok(drafts)
    }
}
