//! In-memory record snapshot, loadable from a directory of CSV exports.
//!
//! Expected files (each optional): `subjects.csv`, `contracts.csv`, `documents.csv`,
//! `equipment.csv`, `roles.csv`. Blank cells read as missing values.
//!
//! Rule definitions may sit alongside as `rules.csv`; they are not records and are
//! loaded separately with [`rule_definitions_in`].

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;

use super::domain::{Frequency, NewRule, RuleType, Severity, SubjectId};
use super::interval::{parse_date, UnparseableDate};
use super::source::{
    ComplianceSource, ContractSnapshot, Directory, DirectoryError, DocumentKind, DocumentSnapshot,
    EquipmentLoan, SourceError, SubjectSnapshot,
};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid CSV data in {file}: {source}")]
    Csv { file: String, source: csv::Error },
    #[error("{file}: {source}")]
    Date {
        file: String,
        source: UnparseableDate,
    },
    #[error("{file}: unknown subject '{subject}'")]
    UnknownSubject { file: String, subject: String },
    #[error("{file}: rule '{code}': {message}")]
    InvalidRule {
        file: String,
        code: String,
        message: String,
    },
}

const RULES_CSV: &str = "rules.csv";

/// Rule definitions from `dir/rules.csv`; none when the file is absent.
pub fn rule_definitions_in(dir: impl AsRef<Path>) -> Result<Vec<NewRule>, SnapshotError> {
    match open_optional(&dir.as_ref().join(RULES_CSV))? {
        Some(reader) => load_rule_definitions(reader),
        None => Ok(Vec::new()),
    }
}

/// Parse rule definitions. Every row carries a code so repeated imports update the same
/// rule; extra recipients are separated by `;`.
pub fn load_rule_definitions<R: Read>(reader: R) -> Result<Vec<NewRule>, SnapshotError> {
    let mut definitions = Vec::new();
    for row in read_rows::<RuleRow, _>(reader, RULES_CSV)? {
        let invalid = |message: String| SnapshotError::InvalidRule {
            file: RULES_CSV.to_string(),
            code: row.code.clone(),
            message,
        };
        if row.code.is_empty() {
            return Err(invalid("a rule code is required".to_string()));
        }

        let rule_type = row
            .rule_type
            .parse::<RuleType>()
            .map_err(|err| invalid(err.to_string()))?;
        let severity = match row.severity.as_deref() {
            Some(raw) => {
                parse_severity(raw).ok_or_else(|| invalid(format!("unknown severity '{raw}'")))?
            }
            None => Severity::Warning,
        };
        let frequency = match row.frequency.as_deref() {
            Some(raw) => {
                parse_frequency(raw).ok_or_else(|| invalid(format!("unknown frequency '{raw}'")))?
            }
            None => Frequency::Daily,
        };
        let extra_recipients = row
            .extra_recipients
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("\n");

        definitions.push(NewRule {
            code: Some(row.code.clone()),
            name: row.name.clone(),
            rule_type,
            severity,
            frequency,
            lookahead_days: row.lookahead_days,
            notify_subject: row.notify_subject.unwrap_or(false),
            notify_manager: row.notify_manager.unwrap_or(false),
            notify_role_group: row.notify_role_group.unwrap_or(false),
            role_group: row.role_group.clone(),
            extra_recipients,
            active: row.active.unwrap_or(true),
        });
    }
    Ok(definitions)
}

fn parse_severity(raw: &str) -> Option<Severity> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "INFO" => Some(Severity::Info),
        "WARNING" => Some(Severity::Warning),
        "CRITICAL" => Some(Severity::Critical),
        _ => None,
    }
}

fn parse_frequency(raw: &str) -> Option<Frequency> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "DAILY" => Some(Frequency::Daily),
        "WEEKLY" => Some(Frequency::Weekly),
        "MONTHLY" => Some(Frequency::Monthly),
        _ => None,
    }
}

#[derive(Debug, Clone)]
struct SubjectEntry {
    snapshot: SubjectSnapshot,
    email: Option<String>,
    manager_email: Option<String>,
}

#[derive(Debug, Clone)]
struct RoleMember {
    role: String,
    email: String,
    active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotSource {
    subjects: Vec<SubjectEntry>,
    contracts: Vec<ContractSnapshot>,
    documents: HashMap<SubjectId, Vec<DocumentSnapshot>>,
    loans: Vec<EquipmentLoan>,
    roles: Vec<RoleMember>,
}

impl SnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subject(
        &mut self,
        snapshot: SubjectSnapshot,
        email: Option<String>,
        manager_email: Option<String>,
    ) -> &mut Self {
        self.subjects.push(SubjectEntry {
            snapshot,
            email,
            manager_email,
        });
        self
    }

    pub fn add_contract(&mut self, contract: ContractSnapshot) -> &mut Self {
        self.contracts.push(contract);
        self
    }

    pub fn add_document(&mut self, document: DocumentSnapshot) -> &mut Self {
        self.documents
            .entry(document.subject.clone())
            .or_default()
            .push(document);
        self
    }

    pub fn add_loan(&mut self, loan: EquipmentLoan) -> &mut Self {
        self.loans.push(loan);
        self
    }

    pub fn add_role_member(&mut self, role: &str, email: &str) -> &mut Self {
        self.roles.push(RoleMember {
            role: role.to_string(),
            email: email.to_string(),
            active: true,
        });
        self
    }

    fn subject_name(&self, id: &SubjectId) -> Option<String> {
        self.subjects
            .iter()
            .find(|entry| &entry.snapshot.id == id)
            .map(|entry| entry.snapshot.name.clone())
    }

    /// Load every CSV export present in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let dir = dir.as_ref();
        let mut source = Self::new();

        if let Some(reader) = open_optional(&dir.join("subjects.csv"))? {
            source.load_subjects(reader)?;
        }
        if let Some(reader) = open_optional(&dir.join("contracts.csv"))? {
            source.load_contracts(reader)?;
        }
        if let Some(reader) = open_optional(&dir.join("documents.csv"))? {
            source.load_documents(reader)?;
        }
        if let Some(reader) = open_optional(&dir.join("equipment.csv"))? {
            source.load_equipment(reader)?;
        }
        if let Some(reader) = open_optional(&dir.join("roles.csv"))? {
            source.load_roles(reader)?;
        }

        Ok(source)
    }

    pub fn load_subjects<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        const FILE: &str = "subjects.csv";
        for row in read_rows::<SubjectRow, _>(reader, FILE)? {
            let medical_visit_due = optional_date(row.medical_visit_due.as_deref(), FILE)?;
            self.add_subject(
                SubjectSnapshot {
                    id: SubjectId(row.id),
                    name: row.name,
                    active: row.active.unwrap_or(true),
                    medical_visit_due,
                },
                row.email,
                row.manager_email,
            );
        }
        Ok(())
    }

    pub fn load_contracts<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        const FILE: &str = "contracts.csv";
        for row in read_rows::<ContractRow, _>(reader, FILE)? {
            let subject = SubjectId(row.subject);
            let subject_name = self.known_subject(&subject, FILE)?;
            let start = parse_date(&row.start).map_err(|source| date_error(FILE, source))?;
            let end = optional_date(row.end.as_deref(), FILE)?;
            self.add_contract(ContractSnapshot {
                id: row.id,
                subject,
                subject_name,
                label: row.label.unwrap_or_else(|| "employment".to_string()),
                start,
                end,
                active: row.active.unwrap_or(true),
            });
        }
        Ok(())
    }

    pub fn load_documents<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        const FILE: &str = "documents.csv";
        for row in read_rows::<DocumentRow, _>(reader, FILE)? {
            let subject = SubjectId(row.subject);
            self.known_subject(&subject, FILE)?;
            self.add_document(DocumentSnapshot {
                subject,
                kind: DocumentKind::from_code(&row.kind),
                verified: row.verified.unwrap_or(false),
            });
        }
        Ok(())
    }

    pub fn load_equipment<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        const FILE: &str = "equipment.csv";
        for row in read_rows::<EquipmentRow, _>(reader, FILE)? {
            let subject = SubjectId(row.subject);
            let subject_name = self.known_subject(&subject, FILE)?;
            let loaned_on = parse_date(&row.loaned_on).map_err(|source| date_error(FILE, source))?;
            let expected_return = optional_date(row.expected_return.as_deref(), FILE)?;
            self.add_loan(EquipmentLoan {
                id: row.id,
                subject,
                subject_name,
                equipment: row.equipment,
                loaned_on,
                expected_return,
                returned: row.returned.unwrap_or(false),
                active: row.active.unwrap_or(true),
            });
        }
        Ok(())
    }

    pub fn load_roles<R: Read>(&mut self, reader: R) -> Result<(), SnapshotError> {
        const FILE: &str = "roles.csv";
        for row in read_rows::<RoleRow, _>(reader, FILE)? {
            self.roles.push(RoleMember {
                role: row.role,
                email: row.email,
                active: row.active.unwrap_or(true),
            });
        }
        Ok(())
    }

    fn known_subject(&self, subject: &SubjectId, file: &str) -> Result<String, SnapshotError> {
        self.subject_name(subject)
            .ok_or_else(|| SnapshotError::UnknownSubject {
                file: file.to_string(),
                subject: subject.0.clone(),
            })
    }
}

impl ComplianceSource for SnapshotSource {
    fn active_contracts(&self) -> Result<Vec<ContractSnapshot>, SourceError> {
        Ok(self
            .contracts
            .iter()
            .filter(|contract| contract.active)
            .cloned()
            .collect())
    }

    fn active_subjects(&self) -> Result<Vec<SubjectSnapshot>, SourceError> {
        Ok(self
            .subjects
            .iter()
            .filter(|entry| entry.snapshot.active)
            .map(|entry| entry.snapshot.clone())
            .collect())
    }

    fn documents_for(&self, subject: &SubjectId) -> Result<Vec<DocumentSnapshot>, SourceError> {
        Ok(self.documents.get(subject).cloned().unwrap_or_default())
    }

    fn equipment_loans(&self) -> Result<Vec<EquipmentLoan>, SourceError> {
        Ok(self.loans.clone())
    }
}

impl Directory for SnapshotSource {
    fn contact_address(&self, subject: &SubjectId) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .subjects
            .iter()
            .find(|entry| &entry.snapshot.id == subject)
            .and_then(|entry| entry.email.clone()))
    }

    fn manager_of(&self, subject: &SubjectId) -> Result<Option<String>, DirectoryError> {
        Ok(self
            .subjects
            .iter()
            .find(|entry| &entry.snapshot.id == subject)
            .and_then(|entry| entry.manager_email.clone()))
    }

    fn members_of_role(&self, role: &str) -> Result<Vec<String>, DirectoryError> {
        Ok(self
            .roles
            .iter()
            .filter(|member| member.active && member.role.eq_ignore_ascii_case(role))
            .map(|member| member.email.clone())
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct SubjectRow {
    id: String,
    name: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    active: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    manager_email: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    medical_visit_due: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContractRow {
    id: String,
    subject: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    label: Option<String>,
    start: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    end: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct DocumentRow {
    subject: String,
    kind: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    verified: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EquipmentRow {
    id: String,
    subject: String,
    equipment: String,
    loaned_on: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    expected_return: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    returned: Option<bool>,
    #[serde(default, deserialize_with = "flexible_bool")]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RuleRow {
    code: String,
    name: String,
    rule_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    severity: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    frequency: Option<String>,
    lookahead_days: u32,
    #[serde(default, deserialize_with = "flexible_bool")]
    notify_subject: Option<bool>,
    #[serde(default, deserialize_with = "flexible_bool")]
    notify_manager: Option<bool>,
    #[serde(default, deserialize_with = "flexible_bool")]
    notify_role_group: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    role_group: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    extra_recipients: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: String,
    email: String,
    #[serde(default, deserialize_with = "flexible_bool")]
    active: Option<bool>,
}

fn open_optional(path: &Path) -> Result<Option<File>, SnapshotError> {
    match File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_rows<T, R>(reader: R, file: &str) -> Result<Vec<T>, SnapshotError>
where
    T: for<'de> Deserialize<'de>,
    R: Read,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    csv_reader
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| SnapshotError::Csv {
            file: file.to_string(),
            source,
        })
}

fn optional_date(raw: Option<&str>, file: &str) -> Result<Option<NaiveDate>, SnapshotError> {
    raw.map(|value| parse_date(value).map_err(|source| date_error(file, source)))
        .transpose()
}

fn date_error(file: &str, source: UnparseableDate) -> SnapshotError {
    SnapshotError::Date {
        file: file.to_string(),
        source,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = empty_string_as_none(deserializer)?;
    match opt.as_deref().map(|value| value.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(value) => match value.as_str() {
            "true" | "yes" | "y" | "1" => Ok(Some(true)),
            "false" | "no" | "n" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean, found '{other}'"
            ))),
        },
    }
}
