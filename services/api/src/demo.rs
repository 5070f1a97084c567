use crate::infra::{build_runner, load_snapshot, OutboxTransport};
use chrono::{Duration, Local, NaiveDate};
use clap::Args;
use hr_compliance::clock::FixedClock;
use hr_compliance::compliance::{
    Alert, ContractSnapshot, DocumentKind, DocumentSnapshot, EquipmentLoan, NewRule, RuleType,
    RunReport, SnapshotSource, SubjectId, SubjectSnapshot,
};
use hr_compliance::config::ComplianceConfig;
use hr_compliance::error::AppError;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Evaluation date (defaults to today). Seeded records are placed relative to it.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Evaluate a directory of CSV exports instead of the seeded records
    #[arg(long)]
    pub(crate) data: Option<PathBuf>,
    /// Print the open alerts as JSON after the walkthrough
    #[arg(long)]
    pub(crate) json: bool,
}

/// Public view of an alert for the demo listing.
#[derive(Debug, Serialize)]
struct AlertLine<'a> {
    reference: &'a str,
    alert_type: RuleType,
    priority: &'static str,
    status: &'static str,
    title: &'a str,
    due_date: Option<NaiveDate>,
}

impl<'a> From<&'a Alert> for AlertLine<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            reference: &alert.reference,
            alert_type: alert.alert_type,
            priority: alert.priority.label(),
            status: alert.status.label(),
            title: &alert.title,
            due_date: alert.due_date,
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { today, data, json } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let snapshot = match data {
        Some(dir) => load_snapshot(Some(&dir))?,
        None => seeded_snapshot(today),
    };

    println!("HR compliance demo ({today})");
    let clock = Arc::new(FixedClock::on(today));
    let outbox = OutboxTransport::default();
    let runner = build_runner(
        &ComplianceConfig::default(),
        snapshot,
        Arc::new(outbox.clone()),
        clock.clone(),
    );

    let mut contract_rule = NewRule::new("Fixed-term contract endings", RuleType::Contract, 30);
    contract_rule.notify_subject = true;
    contract_rule.notify_manager = true;
    let contract_rule = match runner.rules().create(contract_rule) {
        Ok(rule) => rule,
        Err(err) => {
            println!("  Rule setup failed: {err}");
            return Ok(());
        }
    };
    println!(
        "- Rule {} watches contracts ending within {} days",
        contract_rule.code, contract_rule.lookahead_days
    );

    let report = runner.run_all().await;
    println!("\nFirst run");
    render_report(&report);

    let open = runner.alerts().open_alerts().unwrap_or_default();
    println!("\nOpen alerts");
    for alert in &open {
        println!(
            "  - {} [{}] {}{}",
            alert.reference,
            alert.priority.label(),
            alert.title,
            if alert.notification_sent {
                " (rule recipients notified)"
            } else {
                ""
            }
        );
    }

    println!("\nNotifications");
    for message in outbox.messages() {
        println!("  - {} -> {}", message.subject, message.recipients.join(", "));
    }

    let second = runner.run_all().await;
    println!(
        "\nSecond run without data changes: {} new alerts",
        second.total_created()
    );

    if let Some(first) = open.first() {
        let reference = first.reference.clone();
        let follow_up = runner
            .alerts()
            .assign(&reference, "hr.officer")
            .and_then(|_| {
                runner
                    .alerts()
                    .resolve(&reference, "hr.officer", "handled during demo")
            });
        match follow_up {
            Ok(alert) => println!("\nAlert {} {}", alert.reference, alert.status.label()),
            Err(err) => println!("\nAlert follow-up failed: {err}"),
        }

        clock.advance_days(1);
        let third = runner.run_all().await;
        println!(
            "Next day run: {} new alerts (resolved conditions still present are raised again)",
            third.total_created()
        );
    }

    if json {
        let alerts = runner.alerts().open_alerts().unwrap_or_default();
        let lines: Vec<AlertLine<'_>> = alerts.iter().map(AlertLine::from).collect();
        match serde_json::to_string_pretty(&lines) {
            Ok(payload) => println!("\n{payload}"),
            Err(err) => println!("\nOpen alert payload unavailable: {err}"),
        }
    }

    Ok(())
}

fn render_report(report: &RunReport) {
    for (rule_type, outcome) in &report.results {
        match &outcome.error {
            Some(error) => println!("  - {}: failed ({error})", rule_type.label()),
            None => println!(
                "  - {}: {} candidates | {} created | {} already open | {} notification failures",
                rule_type.label(),
                outcome.drafts,
                outcome.created,
                outcome.duplicates,
                outcome.notification_failures
            ),
        }
    }
}

fn seeded_snapshot(today: NaiveDate) -> SnapshotSource {
    let ada = SubjectId("emp-001".to_string());
    let noor = SubjectId("emp-002".to_string());
    let mut snapshot = SnapshotSource::new();

    snapshot
        .add_subject(
            SubjectSnapshot {
                id: ada.clone(),
                name: "Ada Moreau".to_string(),
                active: true,
                medical_visit_due: Some(today + Duration::days(120)),
            },
            Some("ada.moreau@example.com".to_string()),
            Some("camille.roy@example.com".to_string()),
        )
        .add_subject(
            SubjectSnapshot {
                id: noor.clone(),
                name: "Noor Haddad".to_string(),
                active: true,
                medical_visit_due: Some(today - Duration::days(9)),
            },
            Some("noor.haddad@example.com".to_string()),
            Some("camille.roy@example.com".to_string()),
        )
        .add_contract(ContractSnapshot {
            id: "ctr-1001".to_string(),
            subject: ada.clone(),
            subject_name: "Ada Moreau".to_string(),
            label: "Fixed-term".to_string(),
            start: today - Duration::days(355),
            end: Some(today + Duration::days(10)),
            active: true,
        })
        .add_loan(EquipmentLoan {
            id: "eq-501".to_string(),
            subject: noor.clone(),
            subject_name: "Noor Haddad".to_string(),
            equipment: "Laptop".to_string(),
            loaned_on: today - Duration::days(54),
            expected_return: Some(today - Duration::days(15)),
            returned: false,
            active: true,
        })
        .add_role_member("HR_MANAGER", "hr.manager@example.com")
        .add_role_member("HR_ADMIN", "hr.admin@example.com");

    for kind in DocumentKind::mandatory() {
        snapshot.add_document(DocumentSnapshot {
            subject: ada.clone(),
            kind,
            verified: true,
        });
        snapshot.add_document(DocumentSnapshot {
            subject: noor.clone(),
            kind,
            verified: kind != DocumentKind::BankDetails,
        });
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_runs_on_seeded_records() {
        let args = DemoArgs {
            today: NaiveDate::from_ymd_opt(2025, 3, 1),
            data: None,
            json: true,
        };
        run_demo(args).await.expect("demo completes");
    }

    #[tokio::test]
    async fn seeded_records_cover_every_standard_rule_type() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid date");
        let runner = build_runner(
            &ComplianceConfig::default(),
            seeded_snapshot(today),
            Arc::new(OutboxTransport::default()),
            Arc::new(FixedClock::on(today)),
        );

        let report = runner.run_all().await;
        assert!(report.failed_rule_types().is_empty());
        assert!(report.results.values().all(|outcome| outcome.created == 1));
    }
}
