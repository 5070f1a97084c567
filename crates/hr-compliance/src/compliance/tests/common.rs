use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::clock::{Clock, FixedClock};
use crate::compliance::alerts::AlertStore;
use crate::compliance::domain::{
    Alert, AlertDraft, AlertStatus, ComplianceRule, Frequency, OriginRef, Priority, RuleId,
    RuleType, Severity, SubjectId,
};
use crate::compliance::evaluation::EvaluatorRegistry;
use crate::compliance::memory::{InMemoryAlertRepository, InMemoryRuleRepository};
use crate::compliance::notification::{MessageTransport, NotificationDispatcher, TransportError};
use crate::compliance::rules::RuleStore;
use crate::compliance::runner::ComplianceRunner;
use crate::compliance::snapshot::SnapshotSource;
use crate::compliance::source::{
    ComplianceSource, ContractSnapshot, Directory, DirectoryError, DocumentKind,
    DocumentSnapshot, EquipmentLoan, SourceError, SubjectSnapshot,
};

pub(super) const HR_ROLES: [&str; 2] = ["HR_MANAGER", "HR_ADMIN"];

pub(super) type MemoryRunner = ComplianceRunner<InMemoryRuleRepository, InMemoryAlertRepository>;

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Day every scenario runs on.
pub(super) fn run_day() -> NaiveDate {
    date(2025, 3, 1)
}

pub(super) fn ada() -> SubjectId {
    SubjectId("emp-1".to_string())
}

pub(super) fn noor() -> SubjectId {
    SubjectId("emp-2".to_string())
}

/// Two employees:
/// - Ada: complete file, fixed-term contract ending in 10 days, medical visit in June.
/// - Noor: unverified bank details, medical visit missed on 2025-02-20, laptop 15 days late.
pub(super) fn snapshot() -> SnapshotSource {
    let mut source = SnapshotSource::new();
    source
        .add_subject(
            SubjectSnapshot {
                id: ada(),
                name: "Ada Moreau".to_string(),
                active: true,
                medical_visit_due: Some(date(2025, 6, 30)),
            },
            Some("ada@example.com".to_string()),
            Some("lead@example.com".to_string()),
        )
        .add_subject(
            SubjectSnapshot {
                id: noor(),
                name: "Noor Haddad".to_string(),
                active: true,
                medical_visit_due: Some(date(2025, 2, 20)),
            },
            Some("noor@example.com".to_string()),
            Some("lead@example.com".to_string()),
        )
        .add_contract(ContractSnapshot {
            id: "c-1".to_string(),
            subject: ada(),
            subject_name: "Ada Moreau".to_string(),
            label: "Fixed-term".to_string(),
            start: date(2024, 3, 11),
            end: Some(date(2025, 3, 11)),
            active: true,
        })
        .add_contract(ContractSnapshot {
            id: "c-2".to_string(),
            subject: noor(),
            subject_name: "Noor Haddad".to_string(),
            label: "Permanent".to_string(),
            start: date(2023, 9, 1),
            end: None,
            active: true,
        })
        .add_loan(EquipmentLoan {
            id: "l-1".to_string(),
            subject: noor(),
            subject_name: "Noor Haddad".to_string(),
            equipment: "Laptop".to_string(),
            loaned_on: date(2025, 1, 6),
            expected_return: Some(date(2025, 2, 14)),
            returned: false,
            active: true,
        })
        .add_role_member("HR_MANAGER", "hr.manager@example.com")
        .add_role_member("HR_ADMIN", "hr.admin@example.com");

    for kind in DocumentKind::mandatory() {
        source.add_document(DocumentSnapshot {
            subject: ada(),
            kind,
            verified: true,
        });
        source.add_document(DocumentSnapshot {
            subject: noor(),
            kind,
            verified: kind != DocumentKind::BankDetails,
        });
    }

    source
}

pub(super) fn rule(id: u64, code: &str, rule_type: RuleType, lookahead_days: u32) -> ComplianceRule {
    ComplianceRule {
        id: RuleId(id),
        code: code.to_string(),
        name: format!("{} watch", rule_type.label()),
        rule_type,
        severity: Severity::Warning,
        frequency: Frequency::Daily,
        lookahead_days,
        notify_subject: false,
        notify_manager: false,
        notify_role_group: false,
        role_group: None,
        extra_recipients: Vec::new(),
        active: true,
    }
}

pub(super) fn contract_draft(contract_id: &str, rule: Option<RuleId>) -> AlertDraft {
    AlertDraft {
        alert_type: RuleType::Contract,
        title: "Contract ending soon: Ada Moreau".to_string(),
        description: "The Fixed-term contract of Ada Moreau ends on 2025-03-11.".to_string(),
        priority: Priority::High,
        subject: Some(ada()),
        rule,
        origin: Some(OriginRef::new("contract", contract_id)),
        due_date: Some(date(2025, 3, 11)),
    }
}

pub(super) fn alert(reference: &str, due_date: Option<NaiveDate>) -> Alert {
    Alert {
        id: 1,
        reference: reference.to_string(),
        rule: Some(RuleId(1)),
        alert_type: RuleType::Contract,
        title: "Contract ending soon: Ada Moreau".to_string(),
        description: "The Fixed-term contract of Ada Moreau ends soon.".to_string(),
        priority: Priority::High,
        status: AlertStatus::New,
        subject: Some(ada()),
        origin: Some(OriginRef::new("contract", "c-1")),
        detected_at: run_day().and_time(chrono::NaiveTime::MIN).and_utc(),
        due_date,
        resolved_at: None,
        assignee: None,
        resolver: None,
        resolution_comment: None,
        notification_sent: false,
        notified_at: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SentMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

#[derive(Default)]
pub(super) struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingTransport {
    pub(super) fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().expect("transport lock").clone()
    }
}

#[async_trait::async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), TransportError> {
        self.sent.lock().expect("transport lock").push(SentMessage {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

pub(super) struct FailingTransport;

#[async_trait::async_trait]
impl MessageTransport for FailingTransport {
    async fn send(&self, _recipients: &[String], _subject: &str, _body: &str) -> Result<(), TransportError> {
        Err(TransportError::Unavailable("smtp relay offline".to_string()))
    }
}

pub(super) struct SlowTransport(pub Duration);

#[async_trait::async_trait]
impl MessageTransport for SlowTransport {
    async fn send(&self, _recipients: &[String], _subject: &str, _body: &str) -> Result<(), TransportError> {
        tokio::time::sleep(self.0).await;
        Ok(())
    }
}

pub(super) struct FailingDirectory;

impl Directory for FailingDirectory {
    fn contact_address(&self, _subject: &SubjectId) -> Result<Option<String>, DirectoryError> {
        Err(DirectoryError::Lookup("directory offline".to_string()))
    }

    fn manager_of(&self, _subject: &SubjectId) -> Result<Option<String>, DirectoryError> {
        Err(DirectoryError::Lookup("directory offline".to_string()))
    }

    fn members_of_role(&self, _role: &str) -> Result<Vec<String>, DirectoryError> {
        Err(DirectoryError::Lookup("directory offline".to_string()))
    }
}

/// Delegates to a snapshot but refuses to list contracts.
pub(super) struct ContractOutageSource(pub SnapshotSource);

impl ComplianceSource for ContractOutageSource {
    fn active_contracts(&self) -> Result<Vec<ContractSnapshot>, SourceError> {
        Err(SourceError::Unavailable("contract store offline".to_string()))
    }

    fn active_subjects(&self) -> Result<Vec<SubjectSnapshot>, SourceError> {
        self.0.active_subjects()
    }

    fn documents_for(&self, subject: &SubjectId) -> Result<Vec<DocumentSnapshot>, SourceError> {
        self.0.documents_for(subject)
    }

    fn equipment_loans(&self) -> Result<Vec<EquipmentLoan>, SourceError> {
        self.0.equipment_loans()
    }
}

pub(super) struct Harness {
    pub runner: Arc<MemoryRunner>,
    pub clock: Arc<FixedClock>,
}

pub(super) fn hr_roles() -> Vec<String> {
    HR_ROLES.iter().map(|role| role.to_string()).collect()
}

pub(super) fn dispatcher(
    directory: Arc<dyn Directory>,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
) -> NotificationDispatcher {
    NotificationDispatcher::new(
        directory,
        transport,
        clock,
        hr_roles(),
        Duration::from_secs(5),
    )
}

pub(super) fn build_harness(
    source: Arc<dyn ComplianceSource>,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn MessageTransport>,
    evaluators: EvaluatorRegistry,
) -> Harness {
    build_harness_with_lookahead(source, directory, transport, evaluators, 30)
}

pub(super) fn build_harness_with_lookahead(
    source: Arc<dyn ComplianceSource>,
    directory: Arc<dyn Directory>,
    transport: Arc<dyn MessageTransport>,
    evaluators: EvaluatorRegistry,
    default_lookahead_days: u32,
) -> Harness {
    let clock = Arc::new(FixedClock::on(run_day()));
    let rules = Arc::new(RuleStore::new(Arc::new(InMemoryRuleRepository::default())));
    let alerts = Arc::new(AlertStore::new(
        Arc::new(InMemoryAlertRepository::default()),
        clock.clone(),
    ));
    let notifier = Arc::new(dispatcher(directory, transport, clock.clone()));
    let runner = Arc::new(ComplianceRunner::new(
        rules,
        alerts,
        evaluators,
        source,
        notifier,
        clock.clone(),
        default_lookahead_days,
    ));
    Harness { runner, clock }
}

/// Standard evaluators over the shared snapshot, delivering into a recording transport.
pub(super) fn standard_harness() -> (Harness, Arc<RecordingTransport>) {
    let source = Arc::new(snapshot());
    let transport = Arc::new(RecordingTransport::default());
    let harness = build_harness(
        source.clone(),
        source,
        transport.clone(),
        EvaluatorRegistry::standard(),
    );
    (harness, transport)
}

pub(super) fn memory_alert_store() -> AlertStore<InMemoryAlertRepository> {
    AlertStore::new(
        Arc::new(InMemoryAlertRepository::default()),
        Arc::new(FixedClock::on(run_day())),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
