//! Read-only views over the HR records the evaluators scan, plus the identity lookups
//! used to address notifications. Both live outside this crate.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::SubjectId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractSnapshot {
    pub id: String,
    pub subject: SubjectId,
    pub subject_name: String,
    /// Contract category as shown to HR staff (e.g. "Fixed-term").
    pub label: String,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectSnapshot {
    pub id: SubjectId,
    pub name: String,
    pub active: bool,
    pub medical_visit_due: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Identity,
    Cv,
    Diploma,
    BankDetails,
    Other,
}

impl DocumentKind {
    /// Documents every active employee must have on file, verified.
    pub const fn mandatory() -> [Self; 4] {
        [Self::Identity, Self::Cv, Self::Diploma, Self::BankDetails]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Cv => "cv",
            Self::Diploma => "diploma",
            Self::BankDetails => "bank_details",
            Self::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Identity => "identity document",
            Self::Cv => "CV",
            Self::Diploma => "diploma",
            Self::BankDetails => "bank details",
            Self::Other => "other document",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "identity" | "id" | "id_card" | "passport" => Self::Identity,
            "cv" | "resume" => Self::Cv,
            "diploma" => Self::Diploma,
            "bank_details" | "rib" | "iban" => Self::BankDetails,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub subject: SubjectId,
    pub kind: DocumentKind,
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentLoan {
    pub id: String,
    pub subject: SubjectId,
    pub subject_name: String,
    pub equipment: String,
    pub loaned_on: NaiveDate,
    pub expected_return: Option<NaiveDate>,
    pub returned: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("record source unavailable: {0}")]
    Unavailable(String),
}

/// Query interface over the HR records evaluated by the compliance run.
pub trait ComplianceSource: Send + Sync {
    fn active_contracts(&self) -> Result<Vec<ContractSnapshot>, SourceError>;
    fn active_subjects(&self) -> Result<Vec<SubjectSnapshot>, SourceError>;
    fn documents_for(&self, subject: &SubjectId) -> Result<Vec<DocumentSnapshot>, SourceError>;
    fn equipment_loans(&self) -> Result<Vec<EquipmentLoan>, SourceError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

/// Identity, hierarchy and role-roster lookups.
pub trait Directory: Send + Sync {
    fn contact_address(&self, subject: &SubjectId) -> Result<Option<String>, DirectoryError>;
    fn manager_of(&self, subject: &SubjectId) -> Result<Option<String>, DirectoryError>;
    /// Addresses of the active members of a role group.
    fn members_of_role(&self, role: &str) -> Result<Vec<String>, DirectoryError>;
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
