use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the employee (or other record owner) an alert concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(pub String);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    Contract,
    Document,
    Training,
    MedicalVisit,
    Leave,
    Equipment,
    Other,
}

impl RuleType {
    pub const fn ordered() -> [Self; 7] {
        [
            Self::Contract,
            Self::Document,
            Self::Training,
            Self::MedicalVisit,
            Self::Leave,
            Self::Equipment,
            Self::Other,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Contract => "CONTRACT",
            Self::Document => "DOCUMENT",
            Self::Training => "TRAINING",
            Self::MedicalVisit => "MEDICAL_VISIT",
            Self::Leave => "LEAVE",
            Self::Equipment => "EQUIPMENT",
            Self::Other => "OTHER",
        }
    }

    /// Prefix used when generating rule codes such as `CONT-0001`.
    pub const fn code_prefix(self) -> &'static str {
        match self {
            Self::Contract => "CONT",
            Self::Document => "DOC",
            Self::Training => "TRN",
            Self::MedicalVisit => "MED",
            Self::Leave => "LEAV",
            Self::Equipment => "EQP",
            Self::Other => "OTH",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Contract => "Contract",
            Self::Document => "Document",
            Self::Training => "Training",
            Self::MedicalVisit => "Medical visit",
            Self::Leave => "Leave",
            Self::Equipment => "Equipment",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown rule type '{0}'")]
pub struct UnknownRuleType(pub String);

impl FromStr for RuleType {
    type Err = UnknownRuleType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase().replace('-', "_");
        Self::ordered()
            .into_iter()
            .find(|rule_type| rule_type.code() == normalized)
            .ok_or_else(|| UnknownRuleType(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// How often an external scheduler is expected to evaluate a rule. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertStatus {
    New,
    InProgress,
    Resolved,
    Ignored,
    Expired,
}

impl AlertStatus {
    /// Open alerts block creation of a duplicate for the same condition.
    pub const fn is_open(self) -> bool {
        matches!(self, Self::New | Self::InProgress)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Ignored => "ignored",
            Self::Expired => "expired",
        }
    }
}

/// Pointer to the external record that triggered an alert (e.g. a contract).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OriginRef {
    pub kind: String,
    pub id: String,
}

impl OriginRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for OriginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Configured compliance rule. `extra_recipients` is already parsed and validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRule {
    pub id: RuleId,
    pub code: String,
    pub name: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    pub frequency: Frequency,
    pub lookahead_days: u32,
    pub notify_subject: bool,
    pub notify_manager: bool,
    pub notify_role_group: bool,
    /// Roster consulted when `notify_role_group` is set; the configured HR roles otherwise.
    pub role_group: Option<String>,
    pub extra_recipients: Vec<String>,
    pub active: bool,
}

/// Longest lookahead a rule or the default basis may use: ten years.
pub const MAX_LOOKAHEAD_DAYS: u32 = 3650;

/// Rule definition as submitted by an administrator, before code generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    #[serde(default)]
    pub code: Option<String>,
    pub name: String,
    pub rule_type: RuleType,
    pub severity: Severity,
    pub frequency: Frequency,
    pub lookahead_days: u32,
    #[serde(default)]
    pub notify_subject: bool,
    #[serde(default)]
    pub notify_manager: bool,
    #[serde(default)]
    pub notify_role_group: bool,
    #[serde(default)]
    pub role_group: Option<String>,
    /// One address per line.
    #[serde(default)]
    pub extra_recipients: String,
    pub active: bool,
}

impl NewRule {
    pub fn new(name: impl Into<String>, rule_type: RuleType, lookahead_days: u32) -> Self {
        Self {
            code: None,
            name: name.into(),
            rule_type,
            severity: Severity::Warning,
            frequency: Frequency::Daily,
            lookahead_days,
            notify_subject: false,
            notify_manager: false,
            notify_role_group: false,
            role_group: None,
            extra_recipients: String::new(),
            active: true,
        }
    }
}

/// Candidate alert emitted by an evaluator, not yet checked for duplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertDraft {
    pub alert_type: RuleType,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub subject: Option<SubjectId>,
    pub rule: Option<RuleId>,
    pub origin: Option<OriginRef>,
    pub due_date: Option<NaiveDate>,
}

impl AlertDraft {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(
            self.alert_type,
            self.rule,
            self.origin.as_ref(),
            self.subject.as_ref(),
        )
    }
}

/// Identity of the condition an alert stands for. At most one open alert exists per key.
///
/// A ruleless key stands for the condition as a whole: it collides with every rule's key
/// for the same target, while two different rules keep separate keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DedupKey {
    pub alert_type: RuleType,
    pub rule: Option<RuleId>,
    pub target: DedupTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DedupTarget {
    Origin(OriginRef),
    Subject(Option<SubjectId>),
}

impl DedupKey {
    /// Whether an open alert under `self` already covers a draft under `other`.
    pub fn covers(&self, other: &DedupKey) -> bool {
        self.alert_type == other.alert_type
            && self.target == other.target
            && (self.rule == other.rule || self.rule.is_none() || other.rule.is_none())
    }

    fn new(
        alert_type: RuleType,
        rule: Option<RuleId>,
        origin: Option<&OriginRef>,
        subject: Option<&SubjectId>,
    ) -> Self {
        let target = match origin {
            Some(origin) => DedupTarget::Origin(origin.clone()),
            None => DedupTarget::Subject(subject.cloned()),
        };
        Self {
            alert_type,
            rule,
            target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub reference: String,
    pub rule: Option<RuleId>,
    pub alert_type: RuleType,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: AlertStatus,
    pub subject: Option<SubjectId>,
    pub origin: Option<OriginRef>,
    pub detected_at: DateTime<Utc>,
    pub due_date: Option<NaiveDate>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub assignee: Option<String>,
    pub resolver: Option<String>,
    pub resolution_comment: Option<String>,
    pub notification_sent: bool,
    pub notified_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Negative when the due date has passed.
    pub fn days_until_due(&self, today: NaiveDate) -> Option<i64> {
        self.due_date.map(|due| (due - today).num_days())
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date.is_some_and(|due| due < today)
    }

    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(
            self.alert_type,
            self.rule,
            self.origin.as_ref(),
            self.subject.as_ref(),
        )
    }
}
