//! HR compliance core: dated-record validation, compliance rules, periodic evaluation,
//! alert lifecycle and notification of the people responsible.

pub mod alerts;
pub mod domain;
pub mod evaluation;
pub mod interval;
pub mod memory;
pub mod notification;
pub mod reference;
pub mod repository;
pub mod router;
pub mod rules;
pub mod runner;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod temporal;

#[cfg(test)]
mod tests;

pub use alerts::{AlertError, AlertStore, CreateOutcome};
pub use domain::{
    Alert, AlertDraft, AlertStatus, ComplianceRule, DedupKey, Frequency, NewRule, OriginRef,
    Priority, RuleId, RuleType, Severity, SubjectId, MAX_LOOKAHEAD_DAYS,
};
pub use evaluation::{EvaluationContext, EvaluationError, EvaluatorRegistry, RuleEvaluator};
pub use interval::{check_overlap, parse_date, validate_range, Interval, RangeError};
pub use memory::{InMemoryAlertRepository, InMemoryRuleRepository};
pub use notification::{
    DispatchError, DispatchOutcome, MessageTransport, NotificationDispatcher, TransportError,
};
pub use repository::{AlertRepository, RepositoryError, RuleRepository};
pub use router::compliance_router;
pub use rules::{parse_recipients, RuleError, RuleStore};
pub use runner::{ComplianceError, ComplianceRunner, RuleTypeOutcome, RunReport};
pub use snapshot::{load_rule_definitions, rule_definitions_in, SnapshotError, SnapshotSource};
pub use source::{
    ComplianceSource, ContractSnapshot, Directory, DirectoryError, DocumentKind, DocumentSnapshot,
    EquipmentLoan, SourceError, SubjectSnapshot,
};
pub use state::{JsonAlertRepository, JsonRuleRepository};
pub use temporal::{IntervalError, NewTemporalRecord, RecordKind, TemporalRecord, TemporalRegistry};
