use std::sync::{Arc, Mutex};

use tracing::info;

use super::domain::{ComplianceRule, NewRule, RuleId, RuleType, MAX_LOOKAHEAD_DAYS};
use super::reference::{next_in_sequence, rule_code_prefix, RULE_SEQUENCE_WIDTH};
use super::repository::{RepositoryError, RuleRepository};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule code {0} is already in use")]
    DuplicateCode(String),
    #[error("rule {id} code is immutable (currently {current}, requested {requested})")]
    CodeImmutable {
        id: RuleId,
        current: String,
        requested: String,
    },
    #[error("rule {0} not found")]
    NotFound(RuleId),
    #[error("lookahead of {0} days exceeds the {max} day limit", max = MAX_LOOKAHEAD_DAYS)]
    LookaheadOutOfRange(u32),
    #[error("invalid recipient on line {line}: '{value}'")]
    InvalidRecipient { line: usize, value: String },
    #[error("rule store lock poisoned")]
    Unavailable,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Parse the free-text extra recipient list: one address per line, blanks ignored.
pub fn parse_recipients(text: &str) -> Result<Vec<String>, RuleError> {
    let mut recipients = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let candidate = line.trim();
        if candidate.is_empty() {
            continue;
        }
        if !looks_like_address(candidate) {
            return Err(RuleError::InvalidRecipient {
                line: index + 1,
                value: candidate.to_string(),
            });
        }
        recipients.push(candidate.to_string());
    }
    Ok(recipients)
}

fn check_lookahead(lookahead_days: u32) -> Result<(), RuleError> {
    if lookahead_days > MAX_LOOKAHEAD_DAYS {
        return Err(RuleError::LookaheadOutOfRange(lookahead_days));
    }
    Ok(())
}

fn looks_like_address(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }
    match candidate.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

/// Read-mostly store of compliance rules and the authority for rule codes.
pub struct RuleStore<R> {
    repository: Arc<R>,
    creation: Mutex<()>,
}

impl<R> RuleStore<R>
where
    R: RuleRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self {
            repository,
            creation: Mutex::new(()),
        }
    }

    /// Next free code for `rule_type`, e.g. `CONT-0003`.
    pub fn generate_code(&self, rule_type: RuleType) -> Result<String, RuleError> {
        let prefix = rule_code_prefix(rule_type.code_prefix());
        let codes: Vec<String> = self
            .repository
            .all()?
            .into_iter()
            .map(|rule| rule.code)
            .collect();
        Ok(next_in_sequence(&prefix, RULE_SEQUENCE_WIDTH, codes))
    }

    /// Create a rule, generating its code when none was supplied. Generation and insertion
    /// happen under one lock so concurrent creations never share a code.
    pub fn create(&self, rule: NewRule) -> Result<ComplianceRule, RuleError> {
        check_lookahead(rule.lookahead_days)?;
        let extra_recipients = parse_recipients(&rule.extra_recipients)?;
        let _serial = self.creation.lock().map_err(|_| RuleError::Unavailable)?;

        let code = match rule.code.map(|code| code.trim().to_string()) {
            Some(code) if !code.is_empty() => {
                if self.repository.all()?.iter().any(|existing| existing.code == code) {
                    return Err(RuleError::DuplicateCode(code));
                }
                code
            }
            _ => self.generate_code(rule.rule_type)?,
        };

        let stored = self
            .repository
            .insert(ComplianceRule {
                id: RuleId(0),
                code: code.clone(),
                name: rule.name,
                rule_type: rule.rule_type,
                severity: rule.severity,
                frequency: rule.frequency,
                lookahead_days: rule.lookahead_days,
                notify_subject: rule.notify_subject,
                notify_manager: rule.notify_manager,
                notify_role_group: rule.notify_role_group,
                role_group: rule.role_group,
                extra_recipients,
                active: rule.active,
            })
            .map_err(|err| match err {
                RepositoryError::Conflict => RuleError::DuplicateCode(code),
                other => RuleError::Repository(other),
            })?;

        info!(code = %stored.code, rule_type = %stored.rule_type, "compliance rule created");
        Ok(stored)
    }

    /// Replace a rule's settings. The code is fixed once issued.
    pub fn update(&self, rule: ComplianceRule) -> Result<ComplianceRule, RuleError> {
        check_lookahead(rule.lookahead_days)?;
        let current = self.get(rule.id)?;
        if current.code != rule.code {
            return Err(RuleError::CodeImmutable {
                id: rule.id,
                current: current.code,
                requested: rule.code,
            });
        }
        self.repository.update(rule.clone())?;
        Ok(rule)
    }

    /// Apply a definition keyed by its code: an existing rule takes the new settings and
    /// keeps its id, an unknown or missing code creates a rule.
    pub fn upsert(&self, definition: NewRule) -> Result<ComplianceRule, RuleError> {
        let code = definition
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string);
        let existing = match &code {
            Some(code) => self
                .repository
                .all()?
                .into_iter()
                .find(|rule| &rule.code == code),
            None => None,
        };
        let Some(current) = existing else {
            return self.create(definition);
        };

        check_lookahead(definition.lookahead_days)?;
        let revised = ComplianceRule {
            id: current.id,
            code: current.code.clone(),
            name: definition.name,
            rule_type: definition.rule_type,
            severity: definition.severity,
            frequency: definition.frequency,
            lookahead_days: definition.lookahead_days,
            notify_subject: definition.notify_subject,
            notify_manager: definition.notify_manager,
            notify_role_group: definition.notify_role_group,
            role_group: definition.role_group,
            extra_recipients: parse_recipients(&definition.extra_recipients)?,
            active: definition.active,
        };
        if revised == current {
            return Ok(current);
        }
        self.repository.update(revised.clone())?;
        info!(code = %revised.code, "compliance rule updated from definition");
        Ok(revised)
    }

    pub fn get(&self, id: RuleId) -> Result<ComplianceRule, RuleError> {
        self.repository.fetch(id)?.ok_or(RuleError::NotFound(id))
    }

    /// Remove a rule definition. Alerts keep existing; see `AlertStore::detach_rule`.
    pub fn delete(&self, id: RuleId) -> Result<ComplianceRule, RuleError> {
        self.repository.remove(id)?.ok_or(RuleError::NotFound(id))
    }

    /// Active rules of one type, ordered by code.
    pub fn active_rules_of_type(&self, rule_type: RuleType) -> Result<Vec<ComplianceRule>, RuleError> {
        let mut rules: Vec<ComplianceRule> = self
            .repository
            .all()?
            .into_iter()
            .filter(|rule| rule.active && rule.rule_type == rule_type)
            .collect();
        rules.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rules)
    }

    pub fn all(&self) -> Result<Vec<ComplianceRule>, RuleError> {
        let mut rules = self.repository.all()?;
        rules.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rules)
    }
}
