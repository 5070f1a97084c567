//! File-backed repositories: the rule and alert tables live in memory and are written to
//! `rules.json` / `alerts.json` after every change, so one-shot runs share their state.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::domain::{Alert, ComplianceRule, DedupKey, RuleId};
use super::memory::{InMemoryAlertRepository, InMemoryRuleRepository};
use super::repository::{AlertRepository, RepositoryError, RuleRepository};

pub const RULES_FILE: &str = "rules.json";
pub const ALERTS_FILE: &str = "alerts.json";

fn unavailable(path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{}: {err}", path.display()))
}

#[derive(Debug)]
struct JsonFile {
    path: PathBuf,
    writes: Mutex<()>,
}

impl JsonFile {
    fn open(dir: &Path, name: &str) -> Result<Self, RepositoryError> {
        fs::create_dir_all(dir).map_err(|err| unavailable(dir, err))?;
        Ok(Self {
            path: dir.join(name),
            writes: Mutex::new(()),
        })
    }

    fn read<T: DeserializeOwned>(&self) -> Result<Vec<T>, RepositoryError> {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| unavailable(&self.path, err)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(unavailable(&self.path, err)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, RepositoryError> {
        self.writes
            .lock()
            .map_err(|_| RepositoryError::Unavailable("state file lock poisoned".to_string()))
    }

    /// Replace the file contents through a temporary sibling and a rename.
    fn write<T: Serialize>(&self, rows: &[T]) -> Result<(), RepositoryError> {
        let content =
            serde_json::to_vec_pretty(rows).map_err(|err| unavailable(&self.path, err))?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content).map_err(|err| unavailable(&staging, err))?;
        fs::rename(&staging, &self.path).map_err(|err| unavailable(&self.path, err))?;
        debug!(path = %self.path.display(), rows = rows.len(), "state file written");
        Ok(())
    }
}

/// Rule table persisted as `rules.json` inside a state directory.
#[derive(Debug)]
pub struct JsonRuleRepository {
    file: JsonFile,
    table: InMemoryRuleRepository,
}

impl JsonRuleRepository {
    /// Open (or start) the rule table in `dir`, creating the directory when needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let file = JsonFile::open(dir.as_ref(), RULES_FILE)?;
        let rules: Vec<ComplianceRule> = file.read()?;
        Ok(Self {
            table: InMemoryRuleRepository::from_rules(rules),
            file,
        })
    }

    fn persist(&self) -> Result<(), RepositoryError> {
        self.file.write(&self.table.all()?)
    }
}

impl RuleRepository for JsonRuleRepository {
    fn insert(&self, rule: ComplianceRule) -> Result<ComplianceRule, RepositoryError> {
        let _write = self.file.lock()?;
        let stored = self.table.insert(rule)?;
        self.persist()?;
        Ok(stored)
    }

    fn update(&self, rule: ComplianceRule) -> Result<(), RepositoryError> {
        let _write = self.file.lock()?;
        self.table.update(rule)?;
        self.persist()
    }

    fn fetch(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError> {
        self.table.fetch(id)
    }

    fn remove(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError> {
        let _write = self.file.lock()?;
        let removed = self.table.remove(id)?;
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    fn all(&self) -> Result<Vec<ComplianceRule>, RepositoryError> {
        self.table.all()
    }
}

/// Alert table persisted as `alerts.json` inside a state directory.
#[derive(Debug)]
pub struct JsonAlertRepository {
    file: JsonFile,
    table: InMemoryAlertRepository,
}

impl JsonAlertRepository {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let file = JsonFile::open(dir.as_ref(), ALERTS_FILE)?;
        let alerts: Vec<Alert> = file.read()?;
        Ok(Self {
            table: InMemoryAlertRepository::from_alerts(alerts),
            file,
        })
    }

    fn persist(&self) -> Result<(), RepositoryError> {
        self.file.write(&self.table.all()?)
    }
}

impl AlertRepository for JsonAlertRepository {
    fn insert(&self, alert: Alert) -> Result<Alert, RepositoryError> {
        let _write = self.file.lock()?;
        let stored = self.table.insert(alert)?;
        self.persist()?;
        Ok(stored)
    }

    fn update(&self, alert: Alert) -> Result<(), RepositoryError> {
        let _write = self.file.lock()?;
        self.table.update(alert)?;
        self.persist()
    }

    fn fetch(&self, reference: &str) -> Result<Option<Alert>, RepositoryError> {
        self.table.fetch(reference)
    }

    fn find_open(&self, key: &DedupKey) -> Result<Option<Alert>, RepositoryError> {
        self.table.find_open(key)
    }

    fn references_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        self.table.references_with_prefix(prefix)
    }

    fn all(&self) -> Result<Vec<Alert>, RepositoryError> {
        self.table.all()
    }

    fn detach_rule(&self, rule: RuleId) -> Result<usize, RepositoryError> {
        let _write = self.file.lock()?;
        let detached = self.table.detach_rule(rule)?;
        if detached > 0 {
            self.persist()?;
        }
        Ok(detached)
    }
}
