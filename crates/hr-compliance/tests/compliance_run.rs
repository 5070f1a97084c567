use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use hr_compliance::clock::FixedClock;
use hr_compliance::compliance::{
    AlertStatus, AlertStore, ComplianceRunner, EvaluatorRegistry, InMemoryAlertRepository,
    InMemoryRuleRepository, MessageTransport, NewRule, NotificationDispatcher, Priority,
    RuleStore, RuleType, SnapshotSource, TransportError,
};

#[derive(Default)]
struct Outbox {
    messages: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait::async_trait]
impl MessageTransport for Outbox {
    async fn send(&self, recipients: &[String], subject: &str, _body: &str) -> Result<(), TransportError> {
        self.messages
            .lock()
            .expect("outbox lock")
            .push((recipients.to_vec(), subject.to_string()));
        Ok(())
    }
}

fn sample_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/sample")
}

fn run_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date")
}

fn runner(
    outbox: Arc<Outbox>,
) -> ComplianceRunner<InMemoryRuleRepository, InMemoryAlertRepository> {
    let snapshot = Arc::new(SnapshotSource::from_dir(sample_dir()).expect("sample data loads"));
    let clock = Arc::new(FixedClock::on(run_day()));
    let notifier = Arc::new(NotificationDispatcher::new(
        snapshot.clone(),
        outbox,
        clock.clone(),
        vec!["HR_MANAGER".to_string(), "HR_ADMIN".to_string()],
        Duration::from_secs(5),
    ));

    ComplianceRunner::new(
        Arc::new(RuleStore::new(Arc::new(InMemoryRuleRepository::default()))),
        Arc::new(AlertStore::new(
            Arc::new(InMemoryAlertRepository::default()),
            clock.clone(),
        )),
        EvaluatorRegistry::standard(),
        snapshot,
        notifier,
        clock,
        30,
    )
}

#[tokio::test]
async fn sample_export_raises_expected_alerts() {
    let outbox = Arc::new(Outbox::default());
    let runner = runner(outbox.clone());

    let report = runner.run_all().await;

    assert!(report.failed_rule_types().is_empty());
    for rule_type in [
        RuleType::Contract,
        RuleType::Document,
        RuleType::MedicalVisit,
        RuleType::Equipment,
    ] {
        assert_eq!(report.results[&rule_type].created, 2, "{rule_type}");
    }

    let alerts = runner.alerts().all().expect("alerts listed");
    let references: Vec<&str> = alerts.iter().map(|alert| alert.reference.as_str()).collect();
    assert_eq!(references.first(), Some(&"AL202500001"));
    assert_eq!(references.last(), Some(&"AL202500008"));

    let missed_visit = alerts
        .iter()
        .find(|alert| alert.alert_type == RuleType::MedicalVisit && alert.priority == Priority::Critical)
        .expect("missed visit flagged");
    assert_eq!(missed_visit.subject.as_ref().map(|s| s.0.as_str()), Some("emp-002"));

    let messages = outbox.messages.lock().expect("outbox lock");
    assert_eq!(messages.len(), 8, "one HR announcement per alert");
    assert!(messages.iter().all(|(recipients, _)| recipients
        == &vec![
            "hr.manager@example.com".to_string(),
            "hr.admin@example.com".to_string()
        ]));
}

#[tokio::test]
async fn configured_rule_narrows_window_and_notifies_subject_and_manager() {
    let outbox = Arc::new(Outbox::default());
    let runner = runner(outbox.clone());
    let mut rule = NewRule::new("Fixed-term endings", RuleType::Contract, 14);
    rule.notify_subject = true;
    rule.notify_manager = true;
    let rule = runner.rules().create(rule).expect("rule created");

    let outcome = runner
        .run_one(RuleType::Contract)
        .await
        .expect("contract run succeeds");
    assert_eq!(outcome.created, 1, "only the contract ending in 10 days");

    let alert = runner.alerts().get("AL202500001").expect("alert stored");
    assert_eq!(alert.rule, Some(rule.id));
    assert_eq!(alert.priority, Priority::High);
    assert!(alert.notification_sent);

    let messages = outbox.messages.lock().expect("outbox lock");
    assert_eq!(
        messages[0].0,
        vec![
            "ada.moreau@example.com".to_string(),
            "camille.roy@example.com".to_string()
        ]
    );
    assert!(messages[0].1.starts_with("[HIGH]"));
}

#[tokio::test]
async fn workflow_resolution_allows_redetection() {
    let runner = runner(Arc::new(Outbox::default()));
    runner.run_all().await;

    let equipment: Vec<String> = runner
        .alerts()
        .open_alerts()
        .expect("alerts listed")
        .into_iter()
        .filter(|alert| alert.alert_type == RuleType::Equipment)
        .map(|alert| alert.reference)
        .collect();
    assert_eq!(equipment.len(), 2);

    runner
        .alerts()
        .assign(&equipment[0], "it.desk")
        .expect("assigned");
    runner
        .alerts()
        .resolve(&equipment[0], "it.desk", "laptop collected")
        .expect("resolved");
    assert_eq!(
        runner.alerts().get(&equipment[0]).expect("stored").status,
        AlertStatus::Resolved
    );

    let overdue = runner.alerts().overdue(run_day()).expect("listed");
    assert!(overdue.iter().all(|alert| alert.reference != equipment[0]));

    let rerun = runner
        .run_one(RuleType::Equipment)
        .await
        .expect("equipment run succeeds");
    assert_eq!(rerun.created, 1, "loan still unreturned in the export");
    assert_eq!(rerun.duplicates, 1);
}
