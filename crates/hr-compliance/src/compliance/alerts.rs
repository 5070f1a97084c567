use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::clock::Clock;

use super::domain::{Alert, AlertDraft, AlertStatus, RuleId};
use super::reference::{alert_reference_prefix, next_in_sequence, ALERT_SEQUENCE_WIDTH};
use super::repository::{AlertRepository, RepositoryError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    #[error("alert {0} not found")]
    NotFound(String),
    #[error("cannot {action} alert {reference} in status {}", .from.label())]
    InvalidTransition {
        reference: String,
        from: AlertStatus,
        action: &'static str,
    },
    #[error("alert store lock poisoned")]
    Unavailable,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of handing a draft to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(Alert),
    /// An open alert already covers the condition; nothing was written.
    Duplicate(Alert),
}

impl CreateOutcome {
    pub fn was_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    pub fn alert(&self) -> &Alert {
        match self {
            Self::Created(alert) | Self::Duplicate(alert) => alert,
        }
    }

    pub fn created(self) -> Option<Alert> {
        match self {
            Self::Created(alert) => Some(alert),
            Self::Duplicate(_) => None,
        }
    }
}

/// Alert state machine and the single authority on duplicate suppression.
///
/// Every write goes through one lock, so the open-alert check, reference generation and
/// insertion of a draft are a single atomic unit within the process.
pub struct AlertStore<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    writes: Mutex<()>,
}

impl<R> AlertStore<R>
where
    R: AlertRepository + 'static,
{
    pub fn new(repository: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            writes: Mutex::new(()),
        }
    }

    pub fn create_if_absent(&self, draft: AlertDraft) -> Result<CreateOutcome, AlertError> {
        let _serial = self.writes.lock().map_err(|_| AlertError::Unavailable)?;

        let key = draft.dedup_key();
        if let Some(existing) = self.repository.find_open(&key)? {
            debug!(
                reference = %existing.reference,
                alert_type = %draft.alert_type,
                "open alert already covers condition"
            );
            return Ok(CreateOutcome::Duplicate(existing));
        }

        let now = self.clock.now();
        let prefix = alert_reference_prefix(now.date_naive());
        let reference = next_in_sequence(
            &prefix,
            ALERT_SEQUENCE_WIDTH,
            self.repository.references_with_prefix(&prefix)?,
        );

        let alert = self.repository.insert(Alert {
            id: 0,
            reference,
            rule: draft.rule,
            alert_type: draft.alert_type,
            title: draft.title,
            description: draft.description,
            priority: draft.priority,
            status: AlertStatus::New,
            subject: draft.subject,
            origin: draft.origin,
            detected_at: now,
            due_date: draft.due_date,
            resolved_at: None,
            assignee: None,
            resolver: None,
            resolution_comment: None,
            notification_sent: false,
            notified_at: None,
        })?;

        info!(
            reference = %alert.reference,
            alert_type = %alert.alert_type,
            priority = alert.priority.label(),
            "alert created"
        );
        Ok(CreateOutcome::Created(alert))
    }

    /// NEW -> IN_PROGRESS, recording who owns the follow-up.
    pub fn assign(&self, reference: &str, assignee: &str) -> Result<Alert, AlertError> {
        self.transition(reference, "assign", |alert, _| {
            alert.status = AlertStatus::InProgress;
            alert.assignee = Some(assignee.to_string());
        })
    }

    pub fn resolve(&self, reference: &str, resolver: &str, comment: &str) -> Result<Alert, AlertError> {
        self.close(reference, "resolve", AlertStatus::Resolved, resolver, comment)
    }

    pub fn ignore(&self, reference: &str, resolver: &str, comment: &str) -> Result<Alert, AlertError> {
        self.close(reference, "ignore", AlertStatus::Ignored, resolver, comment)
    }

    /// Housekeeping transition, allowed from any status.
    pub fn expire(&self, reference: &str) -> Result<Alert, AlertError> {
        let _serial = self.writes.lock().map_err(|_| AlertError::Unavailable)?;
        let mut alert = self.fetch(reference)?;
        alert.status = AlertStatus::Expired;
        self.repository.update(alert.clone())?;
        Ok(alert)
    }

    pub fn mark_notified(&self, reference: &str, at: DateTime<Utc>) -> Result<Alert, AlertError> {
        let _serial = self.writes.lock().map_err(|_| AlertError::Unavailable)?;
        let mut alert = self.fetch(reference)?;
        alert.notification_sent = true;
        alert.notified_at = Some(at);
        self.repository.update(alert.clone())?;
        Ok(alert)
    }

    /// Null the rule pointer on alerts raised by a deleted rule.
    pub fn detach_rule(&self, rule: RuleId) -> Result<usize, AlertError> {
        let _serial = self.writes.lock().map_err(|_| AlertError::Unavailable)?;
        Ok(self.repository.detach_rule(rule)?)
    }

    pub fn get(&self, reference: &str) -> Result<Alert, AlertError> {
        self.fetch(reference)
    }

    pub fn all(&self) -> Result<Vec<Alert>, AlertError> {
        Ok(self.repository.all()?)
    }

    pub fn open_alerts(&self) -> Result<Vec<Alert>, AlertError> {
        Ok(self
            .repository
            .all()?
            .into_iter()
            .filter(Alert::is_open)
            .collect())
    }

    pub fn overdue(&self, today: NaiveDate) -> Result<Vec<Alert>, AlertError> {
        Ok(self
            .repository
            .all()?
            .into_iter()
            .filter(|alert| alert.is_overdue(today))
            .collect())
    }

    fn fetch(&self, reference: &str) -> Result<Alert, AlertError> {
        self.repository
            .fetch(reference)?
            .ok_or_else(|| AlertError::NotFound(reference.to_string()))
    }

    fn close(
        &self,
        reference: &str,
        action: &'static str,
        status: AlertStatus,
        resolver: &str,
        comment: &str,
    ) -> Result<Alert, AlertError> {
        self.transition(reference, action, |alert, now| {
            alert.status = status;
            alert.resolver = Some(resolver.to_string());
            alert.resolution_comment = Some(comment.to_string());
            alert.resolved_at = Some(now);
        })
    }

    fn transition<F>(&self, reference: &str, action: &'static str, apply: F) -> Result<Alert, AlertError>
    where
        F: FnOnce(&mut Alert, DateTime<Utc>),
    {
        let _serial = self.writes.lock().map_err(|_| AlertError::Unavailable)?;
        let mut alert = self.fetch(reference)?;
        if !alert.is_open() {
            return Err(AlertError::InvalidTransition {
                reference: alert.reference,
                from: alert.status,
                action,
            });
        }

        apply(&mut alert, self.clock.now());
        self.repository.update(alert.clone())?;
        info!(
            reference = %alert.reference,
            action,
            status = alert.status.label(),
            "alert transitioned"
        );
        Ok(alert)
    }
}
