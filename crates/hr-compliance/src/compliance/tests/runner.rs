use std::collections::BTreeSet;
use std::sync::Arc;

use super::common::*;
use crate::clock::Clock;
use crate::compliance::domain::{AlertStatus, NewRule, Priority, RuleType};
use crate::compliance::evaluation::{
    ContractExpiryEvaluator, EquipmentOverdueEvaluator, EvaluationContext, EvaluatorRegistry,
    MedicalVisitEvaluator, MissingDocumentEvaluator, RuleEvaluator,
};
use crate::compliance::runner::ComplianceError;

fn contract_rule(runner: &MemoryRunner) -> crate::compliance::domain::ComplianceRule {
    runner
        .rules()
        .create(NewRule::new("Fixed-term endings", RuleType::Contract, 30))
        .expect("rule created")
}

#[tokio::test]
async fn contract_expiring_within_lookahead_raises_one_alert() {
    let (harness, _) = standard_harness();
    let runner = &harness.runner;
    let rule = contract_rule(runner);
    assert_eq!(rule.code, "CONT-0001");

    let outcome = runner.run_one(RuleType::Contract).await.expect("run succeeds");
    assert_eq!(outcome.drafts, 1);
    assert_eq!(outcome.created, 1);

    let alert = runner.alerts().get("AL202500001").expect("alert stored");
    assert_eq!(alert.priority, Priority::High);
    assert_eq!(alert.rule, Some(rule.id));
    assert_eq!(alert.status, AlertStatus::New);

    let rerun = runner.run_one(RuleType::Contract).await.expect("run succeeds");
    assert_eq!(rerun.created, 0);
    assert_eq!(rerun.duplicates, 1);
    assert_eq!(runner.alerts().all().expect("listed").len(), 1);
}

#[tokio::test]
async fn in_progress_alert_suppresses_a_fresh_draft() {
    let (harness, _) = standard_harness();
    let runner = &harness.runner;
    contract_rule(runner);
    runner.run_one(RuleType::Contract).await.expect("run succeeds");
    runner
        .alerts()
        .assign("AL202500001", "hr.officer")
        .expect("assigned");

    let source = snapshot();
    let rules = runner
        .rules()
        .active_rules_of_type(RuleType::Contract)
        .expect("rules listed");
    let drafts = ContractExpiryEvaluator
        .evaluate(&EvaluationContext {
            today: run_day(),
            rules: &rules,
            default_lookahead_days: 30,
            source: &source,
        })
        .expect("evaluated");
    assert_eq!(drafts.len(), 1, "evaluators keep emitting the condition");

    let outcome = runner
        .alerts()
        .create_if_absent(drafts[0].clone())
        .expect("checked");
    assert!(outcome.was_duplicate());
    assert_eq!(outcome.alert().status, AlertStatus::InProgress);
    assert_eq!(runner.alerts().all().expect("listed").len(), 1);
}

#[tokio::test]
async fn resolved_condition_is_detected_again_on_next_run() {
    let (harness, _) = standard_harness();
    let runner = &harness.runner;
    contract_rule(runner);
    runner.run_one(RuleType::Contract).await.expect("run succeeds");

    let resolved = runner
        .alerts()
        .resolve("AL202500001", "hr.officer", "renewal in progress")
        .expect("resolved");
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert_eq!(resolved.resolved_at, Some(harness.clock.now()));

    let outcome = runner.run_one(RuleType::Contract).await.expect("run succeeds");
    assert_eq!(outcome.created, 1);
    assert!(runner.alerts().get("AL202500002").expect("new alert").is_open());
}

#[tokio::test]
async fn transport_failure_keeps_the_alert_unsent() {
    let source = Arc::new(snapshot());
    let harness = build_harness(
        source.clone(),
        source,
        Arc::new(FailingTransport),
        EvaluatorRegistry::standard(),
    );
    let runner = &harness.runner;
    let mut new_rule = NewRule::new("Fixed-term endings", RuleType::Contract, 30);
    new_rule.notify_subject = true;
    runner.rules().create(new_rule).expect("rule created");

    let report = runner.run_all().await;
    assert!(report.failed_rule_types().is_empty());

    let contract = &report.results[&RuleType::Contract];
    assert_eq!(contract.created, 1);
    assert_eq!(contract.notification_failures, 2);

    let alert = runner.alerts().get("AL202500001").expect("alert persisted");
    assert!(!alert.notification_sent);
    assert_eq!(alert.notified_at, None);
}

#[tokio::test]
async fn successful_rule_notification_is_recorded_on_the_alert() {
    let (harness, transport) = standard_harness();
    let runner = &harness.runner;
    let mut new_rule = NewRule::new("Fixed-term endings", RuleType::Contract, 30);
    new_rule.notify_subject = true;
    new_rule.notify_manager = true;
    runner.rules().create(new_rule).expect("rule created");

    runner.run_one(RuleType::Contract).await.expect("run succeeds");

    let alert = runner.alerts().get("AL202500001").expect("alert stored");
    assert!(alert.notification_sent);
    assert!(alert.notified_at.is_some());

    let sent = transport.sent();
    assert_eq!(sent.len(), 2, "rule dispatch plus HR announcement");
    assert_eq!(
        sent[0].recipients,
        vec!["ada@example.com".to_string(), "lead@example.com".to_string()]
    );
    assert_eq!(
        sent[1].recipients,
        vec![
            "hr.manager@example.com".to_string(),
            "hr.admin@example.com".to_string()
        ]
    );
}

#[tokio::test]
async fn ruleless_alerts_are_only_announced_to_hr() {
    let (harness, transport) = standard_harness();
    let runner = &harness.runner;

    runner.run_one(RuleType::Equipment).await.expect("run succeeds");

    let alert = runner.alerts().get("AL202500001").expect("alert stored");
    assert_eq!(alert.rule, None);
    assert!(!alert.notification_sent);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn running_twice_creates_nothing_new() {
    let (harness, _) = standard_harness();
    let runner = &harness.runner;

    let first = runner.run_all().await;
    assert_eq!(first.total_created(), 4);

    let second = runner.run_all().await;
    assert_eq!(second.total_created(), 0);
    assert!(second.results.values().all(|outcome| outcome.duplicates == outcome.drafts));
    assert_eq!(runner.alerts().all().expect("listed").len(), 4);
}

#[tokio::test]
async fn failing_rule_type_does_not_stop_the_others() {
    let source = Arc::new(ContractOutageSource(snapshot()));
    let directory = Arc::new(snapshot());
    let harness = build_harness(
        source,
        directory,
        Arc::new(RecordingTransport::default()),
        EvaluatorRegistry::standard(),
    );

    let report = harness.runner.run_all().await;

    assert_eq!(report.failed_rule_types(), vec![RuleType::Contract]);
    let contract = &report.results[&RuleType::Contract];
    assert!(contract
        .error
        .as_deref()
        .is_some_and(|error| error.contains("contract store offline")));
    assert_eq!(report.total_created(), 3);
}

#[tokio::test]
async fn out_of_range_lookahead_fails_only_its_rule_type() {
    let source = Arc::new(snapshot());
    let harness = build_harness_with_lookahead(
        source.clone(),
        source,
        Arc::new(RecordingTransport::default()),
        EvaluatorRegistry::standard(),
        u32::MAX,
    );

    let report = harness.runner.run_all().await;

    assert_eq!(report.failed_rule_types(), vec![RuleType::Contract]);
    assert!(report.results[&RuleType::Contract]
        .error
        .as_deref()
        .is_some_and(|error| error.contains("runs past the supported calendar")));
    assert_eq!(report.results[&RuleType::Document].created, 1);
    assert_eq!(report.results[&RuleType::MedicalVisit].created, 1);
    assert_eq!(report.results[&RuleType::Equipment].created, 1);
}

#[tokio::test]
async fn medical_window_stays_fixed_when_the_default_lookahead_grows() {
    let source = Arc::new(snapshot());
    let harness = build_harness_with_lookahead(
        source.clone(),
        source,
        Arc::new(RecordingTransport::default()),
        EvaluatorRegistry::standard(),
        200,
    );

    let medical = harness
        .runner
        .run_one(RuleType::MedicalVisit)
        .await
        .expect("medical run succeeds");
    assert_eq!(medical.created, 1, "only the missed visit, not the one in June");

    let contracts = harness
        .runner
        .run_one(RuleType::Contract)
        .await
        .expect("contract run succeeds");
    assert_eq!(contracts.created, 1);
}

#[tokio::test]
async fn unregistered_rule_type_is_rejected() {
    let (harness, _) = standard_harness();
    assert_eq!(
        harness.runner.run_one(RuleType::Training).await,
        Err(ComplianceError::UnsupportedRuleType(RuleType::Training))
    );
}

#[tokio::test]
async fn manual_alerts_share_dedup_and_notification() {
    let (harness, transport) = standard_harness();
    let runner = &harness.runner;
    let mut draft = contract_draft("c-1", None);
    draft.alert_type = RuleType::Other;
    draft.origin = None;

    let created = runner.raise(draft.clone()).await.expect("raised");
    assert!(!created.was_duplicate());
    assert_eq!(transport.sent().len(), 1);

    let again = runner.raise(draft).await.expect("checked");
    assert!(again.was_duplicate());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn evaluator_order_does_not_change_the_alert_set() {
    let evaluators: Vec<Arc<dyn RuleEvaluator>> = vec![
        Arc::new(ContractExpiryEvaluator),
        Arc::new(MissingDocumentEvaluator),
        Arc::new(MedicalVisitEvaluator),
        Arc::new(EquipmentOverdueEvaluator),
    ];

    let mut observed: Option<BTreeSet<String>> = None;
    for order in permutations(&evaluators) {
        let mut registry = EvaluatorRegistry::empty();
        for evaluator in order {
            registry.register(evaluator);
        }

        let source = Arc::new(snapshot());
        let harness = build_harness(
            source.clone(),
            source,
            Arc::new(RecordingTransport::default()),
            registry,
        );
        harness.runner.run_all().await;
        harness.runner.run_all().await;

        let conditions: BTreeSet<String> = harness
            .runner
            .alerts()
            .all()
            .expect("listed")
            .into_iter()
            .map(|alert| {
                format!(
                    "{}|{:?}|{:?}|{:?}",
                    alert.alert_type, alert.origin, alert.priority, alert.due_date
                )
            })
            .collect();
        assert_eq!(conditions.len(), 4);

        match &observed {
            Some(expected) => assert_eq!(&conditions, expected),
            None => observed = Some(conditions),
        }
    }
}

fn permutations<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }

    let mut result = Vec::new();
    for index in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(index);
        for mut tail in permutations(&rest) {
            tail.insert(0, head.clone());
            result.push(tail);
        }
    }
    result
}
