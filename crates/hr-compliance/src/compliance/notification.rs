//! Best-effort delivery of alert notifications.
//!
//! Failures are returned to the caller for logging and never undo the alert they concern.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;

use super::domain::{Alert, ComplianceRule};
use super::source::Directory;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("message transport unavailable: {0}")]
    Unavailable(String),
    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Outbound mail (or chat, or queue) adapter.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("transport did not answer within {0:?}")]
    Timeout(Duration),
}

/// A composed notification, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent {
        recipients: Vec<String>,
        at: DateTime<Utc>,
    },
    /// No recipient could be resolved; nothing was sent.
    NoRecipients,
}

pub struct NotificationDispatcher {
    directory: Arc<dyn Directory>,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
    hr_roles: Vec<String>,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn Directory>,
        transport: Arc<dyn MessageTransport>,
        clock: Arc<dyn Clock>,
        hr_roles: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            directory,
            transport,
            clock,
            hr_roles,
            timeout,
        }
    }

    /// Recipients selected by the rule's flags, de-duplicated case-insensitively in
    /// first-seen order. Lookup failures drop that source of recipients and are logged.
    pub fn recipients_for(&self, alert: &Alert, rule: &ComplianceRule) -> Vec<String> {
        let mut candidates = Vec::new();

        if let Some(subject) = alert.subject.as_ref() {
            if rule.notify_subject {
                match self.directory.contact_address(subject) {
                    Ok(Some(address)) => candidates.push(address),
                    Ok(None) => debug!(%subject, "subject has no contact address"),
                    Err(err) => warn!(%subject, error = %err, "subject address lookup failed"),
                }
            }
            if rule.notify_manager {
                match self.directory.manager_of(subject) {
                    Ok(Some(address)) => candidates.push(address),
                    Ok(None) => debug!(%subject, "subject has no manager on record"),
                    Err(err) => warn!(%subject, error = %err, "manager lookup failed"),
                }
            }
        }

        if rule.notify_role_group {
            let roles = match rule.role_group.as_ref() {
                Some(role) => vec![role.clone()],
                None => self.hr_roles.clone(),
            };
            candidates.extend(self.roster(&roles));
        }

        candidates.extend(rule.extra_recipients.iter().cloned());
        dedup_addresses(candidates)
    }

    /// Send the rule-driven notification for a freshly created alert.
    pub async fn dispatch(&self, alert: &Alert, rule: &ComplianceRule) -> Result<DispatchOutcome, DispatchError> {
        let recipients = self.recipients_for(alert, rule);
        self.deliver(alert, recipients).await
    }

    /// Tell the HR roster about a new alert, whatever the originating rule asked for.
    pub async fn announce(&self, alert: &Alert) -> Result<DispatchOutcome, DispatchError> {
        let recipients = dedup_addresses(self.roster(&self.hr_roles));
        self.deliver(alert, recipients).await
    }

    fn roster(&self, roles: &[String]) -> Vec<String> {
        let mut members = Vec::new();
        for role in roles {
            match self.directory.members_of_role(role) {
                Ok(addresses) => members.extend(addresses),
                Err(err) => warn!(role = %role, error = %err, "role roster lookup failed"),
            }
        }
        members
    }

    async fn deliver(&self, alert: &Alert, recipients: Vec<String>) -> Result<DispatchOutcome, DispatchError> {
        if recipients.is_empty() {
            debug!(reference = %alert.reference, "no recipients resolved, skipping notification");
            return Ok(DispatchOutcome::NoRecipients);
        }

        let message = compose(alert, self.clock.today());
        let send = self
            .transport
            .send(&recipients, &message.subject, &message.body);
        match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(())) => {
                info!(
                    reference = %alert.reference,
                    recipients = recipients.len(),
                    "alert notification delivered"
                );
                Ok(DispatchOutcome::Sent {
                    recipients,
                    at: self.clock.now(),
                })
            }
            Ok(Err(err)) => Err(DispatchError::Transport(err)),
            Err(_) => Err(DispatchError::Timeout(self.timeout)),
        }
    }
}

fn dedup_addresses(candidates: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .map(|address| address.trim().to_string())
        .filter(|address| !address.is_empty())
        .filter(|address| seen.insert(address.to_lowercase()))
        .collect()
}

/// Subject line carries the priority; the body carries reference, type, description and
/// the time left before the due date.
pub fn compose(alert: &Alert, today: NaiveDate) -> Message {
    let subject = format!(
        "[{}] {}",
        alert.priority.label().to_uppercase(),
        alert.title
    );

    let mut body = format!(
        "Reference: {}\nType: {}\nPriority: {}\n\n{}\n",
        alert.reference,
        alert.alert_type.label(),
        alert.priority.label(),
        alert.description
    );
    if let (Some(due), Some(days)) = (alert.due_date, alert.days_until_due(today)) {
        body.push_str(&format!("\nDue date: {} ({})\n", due, due_phrase(days)));
    }

    Message { subject, body }
}

/// "overdue by N days", "due today" or "N days remaining".
pub fn due_phrase(days_until_due: i64) -> String {
    let unit = |n: i64| if n == 1 { "day" } else { "days" };
    match days_until_due {
        0 => "due today".to_string(),
        days if days < 0 => format!("overdue by {} {}", -days, unit(-days)),
        days => format!("{} {} remaining", days, unit(days)),
    }
}
