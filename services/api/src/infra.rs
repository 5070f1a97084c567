use chrono::NaiveDate;
use hr_compliance::clock::Clock;
use hr_compliance::compliance::{
    rule_definitions_in, AlertRepository, AlertStore, ComplianceRunner, EvaluatorRegistry,
    InMemoryAlertRepository, InMemoryRuleRepository, JsonAlertRepository, JsonRuleRepository,
    MessageTransport, NotificationDispatcher, RuleRepository, RuleStore, SnapshotSource,
    TransportError,
};
use hr_compliance::config::ComplianceConfig;
use hr_compliance::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

pub(crate) type MemoryRunner = ComplianceRunner<InMemoryRuleRepository, InMemoryAlertRepository>;
pub(crate) type StateRunner = ComplianceRunner<JsonRuleRepository, JsonAlertRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Transport that writes each outgoing notification to the log instead of a mail relay.
#[derive(Debug, Clone)]
pub(crate) struct LogTransport {
    sender: String,
}

impl LogTransport {
    pub(crate) fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait::async_trait]
impl MessageTransport for LogTransport {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<(), TransportError> {
        info!(
            sender = %self.sender,
            recipients = %recipients.join(", "),
            subject,
            lines = body.lines().count(),
            "notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutboxMessage {
    pub(crate) recipients: Vec<String>,
    pub(crate) subject: String,
}

/// Keeps sent notifications in memory so the demo can print them.
#[derive(Default, Clone)]
pub(crate) struct OutboxTransport {
    messages: Arc<Mutex<Vec<OutboxMessage>>>,
}

impl OutboxTransport {
    pub(crate) fn messages(&self) -> Vec<OutboxMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait::async_trait]
impl MessageTransport for OutboxTransport {
    async fn send(&self, recipients: &[String], subject: &str, _body: &str) -> Result<(), TransportError> {
        let mut guard = self
            .messages
            .lock()
            .map_err(|_| TransportError::Unavailable("outbox poisoned".to_string()))?;
        guard.push(OutboxMessage {
            recipients: recipients.to_vec(),
            subject: subject.to_string(),
        });
        Ok(())
    }
}

/// Load CSV exports from `data`, or start from an empty snapshot.
pub(crate) fn load_snapshot(data: Option<&Path>) -> Result<SnapshotSource, AppError> {
    match data {
        Some(dir) => {
            let snapshot = SnapshotSource::from_dir(dir)?;
            info!(data = %dir.display(), "record snapshot loaded");
            Ok(snapshot)
        }
        None => Ok(SnapshotSource::new()),
    }
}

/// Wire a runner over in-memory rule and alert tables, with the snapshot serving as both
/// the record source and the directory.
pub(crate) fn build_runner(
    config: &ComplianceConfig,
    snapshot: SnapshotSource,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
) -> MemoryRunner {
    assemble(
        config,
        InMemoryRuleRepository::default(),
        InMemoryAlertRepository::default(),
        snapshot,
        transport,
        clock,
    )
}

/// Same wiring over the JSON tables in `state_dir`, so alerts and rules outlive the process.
pub(crate) fn open_runner(
    config: &ComplianceConfig,
    state_dir: &Path,
    snapshot: SnapshotSource,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
) -> Result<StateRunner, AppError> {
    let rules = JsonRuleRepository::open(state_dir)?;
    let alerts = JsonAlertRepository::open(state_dir)?;
    info!(state = %state_dir.display(), "compliance state opened");
    Ok(assemble(config, rules, alerts, snapshot, transport, clock))
}

fn assemble<RR, AR>(
    config: &ComplianceConfig,
    rules: RR,
    alerts: AR,
    snapshot: SnapshotSource,
    transport: Arc<dyn MessageTransport>,
    clock: Arc<dyn Clock>,
) -> ComplianceRunner<RR, AR>
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    let snapshot = Arc::new(snapshot);
    let notifier = Arc::new(NotificationDispatcher::new(
        snapshot.clone(),
        transport,
        clock.clone(),
        config.hr_roles.clone(),
        config.notify_timeout,
    ));

    ComplianceRunner::new(
        Arc::new(RuleStore::new(Arc::new(rules))),
        Arc::new(AlertStore::new(Arc::new(alerts), clock.clone())),
        EvaluatorRegistry::standard(),
        snapshot,
        notifier,
        clock,
        config.default_lookahead_days,
    )
}

/// Apply `rules.csv` from the export directory, when there is one, on top of the stored rules.
pub(crate) fn apply_rule_definitions<RR, AR>(
    runner: &ComplianceRunner<RR, AR>,
    data: Option<&Path>,
) -> Result<usize, AppError>
where
    RR: RuleRepository + 'static,
    AR: AlertRepository + 'static,
{
    let Some(dir) = data else {
        return Ok(0);
    };
    let definitions = rule_definitions_in(dir)?;
    let applied = definitions.len();
    for definition in definitions {
        runner.rules().upsert(definition)?;
    }
    if applied > 0 {
        info!(data = %dir.display(), rules = applied, "rule definitions applied");
    }
    Ok(applied)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    hr_compliance::compliance::parse_date(raw).map_err(|err| err.to_string())
}
