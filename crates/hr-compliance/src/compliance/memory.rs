//! Mutex-backed repositories used by the CLI, demos and tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{Alert, ComplianceRule, DedupKey, RuleId};
use super::repository::{AlertRepository, RepositoryError, RuleRepository};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("in-memory store poisoned".to_string()))
}

#[derive(Debug, Default)]
struct RuleTable {
    next_id: u64,
    rules: BTreeMap<RuleId, ComplianceRule>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRuleRepository {
    table: Arc<Mutex<RuleTable>>,
}

impl InMemoryRuleRepository {
    /// Seed the table with previously stored rules; new ids continue after the highest one.
    pub fn from_rules(rules: impl IntoIterator<Item = ComplianceRule>) -> Self {
        let rules: BTreeMap<RuleId, ComplianceRule> =
            rules.into_iter().map(|rule| (rule.id, rule)).collect();
        let next_id = rules.keys().map(|id| id.0).max().unwrap_or(0);
        Self {
            table: Arc::new(Mutex::new(RuleTable { next_id, rules })),
        }
    }
}

impl RuleRepository for InMemoryRuleRepository {
    fn insert(&self, mut rule: ComplianceRule) -> Result<ComplianceRule, RepositoryError> {
        let mut table = lock(&self.table)?;
        if table.rules.values().any(|existing| existing.code == rule.code) {
            return Err(RepositoryError::Conflict);
        }
        table.next_id += 1;
        rule.id = RuleId(table.next_id);
        table.rules.insert(rule.id, rule.clone());
        Ok(rule)
    }

    fn update(&self, rule: ComplianceRule) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table)?;
        match table.rules.get_mut(&rule.id) {
            Some(slot) => {
                *slot = rule;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError> {
        Ok(lock(&self.table)?.rules.get(&id).cloned())
    }

    fn remove(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError> {
        Ok(lock(&self.table)?.rules.remove(&id))
    }

    fn all(&self) -> Result<Vec<ComplianceRule>, RepositoryError> {
        Ok(lock(&self.table)?.rules.values().cloned().collect())
    }
}

#[derive(Debug, Default)]
struct AlertTable {
    next_id: u64,
    alerts: BTreeMap<String, Alert>,
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAlertRepository {
    table: Arc<Mutex<AlertTable>>,
}

impl InMemoryAlertRepository {
    pub fn from_alerts(alerts: impl IntoIterator<Item = Alert>) -> Self {
        let alerts: BTreeMap<String, Alert> = alerts
            .into_iter()
            .map(|alert| (alert.reference.clone(), alert))
            .collect();
        let next_id = alerts.values().map(|alert| alert.id).max().unwrap_or(0);
        Self {
            table: Arc::new(Mutex::new(AlertTable { next_id, alerts })),
        }
    }
}

impl AlertRepository for InMemoryAlertRepository {
    fn insert(&self, mut alert: Alert) -> Result<Alert, RepositoryError> {
        let mut table = lock(&self.table)?;
        if table.alerts.contains_key(&alert.reference) {
            return Err(RepositoryError::Conflict);
        }
        table.next_id += 1;
        alert.id = table.next_id;
        table.alerts.insert(alert.reference.clone(), alert.clone());
        Ok(alert)
    }

    fn update(&self, alert: Alert) -> Result<(), RepositoryError> {
        let mut table = lock(&self.table)?;
        match table.alerts.get_mut(&alert.reference) {
            Some(slot) => {
                *slot = alert;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, reference: &str) -> Result<Option<Alert>, RepositoryError> {
        Ok(lock(&self.table)?.alerts.get(reference).cloned())
    }

    fn find_open(&self, key: &DedupKey) -> Result<Option<Alert>, RepositoryError> {
        Ok(lock(&self.table)?
            .alerts
            .values()
            .find(|alert| alert.is_open() && alert.dedup_key().covers(key))
            .cloned())
    }

    fn references_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(lock(&self.table)?
            .alerts
            .keys()
            .filter(|reference| reference.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Alert>, RepositoryError> {
        let mut alerts: Vec<Alert> = lock(&self.table)?.alerts.values().cloned().collect();
        alerts.sort_by_key(|alert| alert.id);
        Ok(alerts)
    }

    fn detach_rule(&self, rule: RuleId) -> Result<usize, RepositoryError> {
        let mut table = lock(&self.table)?;
        let mut detached = 0;
        for alert in table.alerts.values_mut() {
            if alert.rule == Some(rule) {
                alert.rule = None;
                detached += 1;
            }
        }
        Ok(detached)
    }
}
