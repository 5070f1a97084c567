use super::domain::{Alert, ComplianceRule, DedupKey, RuleId};

/// Storage for compliance rule definitions.
pub trait RuleRepository: Send + Sync {
    /// Persist a new rule; the repository assigns its identifier.
    fn insert(&self, rule: ComplianceRule) -> Result<ComplianceRule, RepositoryError>;
    fn update(&self, rule: ComplianceRule) -> Result<(), RepositoryError>;
    fn fetch(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError>;
    fn remove(&self, id: RuleId) -> Result<Option<ComplianceRule>, RepositoryError>;
    fn all(&self) -> Result<Vec<ComplianceRule>, RepositoryError>;
}

/// Storage for alerts. Deduplication and state transitions live in `AlertStore`.
pub trait AlertRepository: Send + Sync {
    /// Persist a new alert; the repository assigns its identifier and rejects a reused
    /// reference with `Conflict`.
    fn insert(&self, alert: Alert) -> Result<Alert, RepositoryError>;
    fn update(&self, alert: Alert) -> Result<(), RepositoryError>;
    fn fetch(&self, reference: &str) -> Result<Option<Alert>, RepositoryError>;
    /// An alert in NEW or IN_PROGRESS whose key covers `key` (see `DedupKey::covers`).
    fn find_open(&self, key: &DedupKey) -> Result<Option<Alert>, RepositoryError>;
    fn references_with_prefix(&self, prefix: &str) -> Result<Vec<String>, RepositoryError>;
    fn all(&self) -> Result<Vec<Alert>, RepositoryError>;
    /// Null out the rule pointer of every alert raised by `rule`, returning how many changed.
    fn detach_rule(&self, rule: RuleId) -> Result<usize, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
