use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::compliance::domain::MAX_LOOKAHEAD_DAYS;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub compliance: ComplianceConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            compliance: ComplianceConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 30;
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HR_ROLES: &str = "HR_MANAGER,HR_ADMIN";
pub const DEFAULT_STATE_DIR: &str = "var/compliance";

/// Knobs for the compliance run and its notification fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceConfig {
    /// Lookahead used by the synthetic rule when no rule of a type is configured.
    /// Medical visits keep their own fixed window.
    pub default_lookahead_days: u32,
    /// Upper bound on a single transport send.
    pub notify_timeout: Duration,
    /// Role-group rosters that hear about every newly created alert.
    pub hr_roles: Vec<String>,
    pub sender: String,
    /// Where `rules.json` and `alerts.json` are kept between runs.
    pub state_dir: PathBuf,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            default_lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
            notify_timeout: Duration::from_secs(DEFAULT_NOTIFY_TIMEOUT_SECS),
            hr_roles: split_roles(DEFAULT_HR_ROLES),
            sender: "compliance@localhost".to_string(),
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

impl ComplianceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_lookahead_days = match env::var("COMPLIANCE_DEFAULT_LOOKAHEAD_DAYS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(days) if days <= MAX_LOOKAHEAD_DAYS => days,
                _ => return Err(ConfigError::InvalidLookahead(raw)),
            },
            Err(_) => defaults.default_lookahead_days,
        };

        let notify_timeout = match env::var("COMPLIANCE_NOTIFY_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidNotifyTimeout(raw)),
            },
            Err(_) => defaults.notify_timeout,
        };

        let hr_roles = env::var("COMPLIANCE_HR_ROLES")
            .map(|raw| split_roles(&raw))
            .unwrap_or(defaults.hr_roles);

        let sender = env::var("COMPLIANCE_SENDER").unwrap_or(defaults.sender);

        let state_dir = env::var("COMPLIANCE_STATE_DIR")
            .ok()
            .filter(|raw| !raw.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.state_dir);

        Ok(Self {
            default_lookahead_days,
            notify_timeout,
            hr_roles,
            sender,
            state_dir,
        })
    }
}

fn split_roles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|role| !role.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLookahead(String),
    InvalidNotifyTimeout(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLookahead(raw) => write!(
                f,
                "COMPLIANCE_DEFAULT_LOOKAHEAD_DAYS must be an integer between 0 and {}, got '{}'",
                MAX_LOOKAHEAD_DAYS, raw
            ),
            ConfigError::InvalidNotifyTimeout(raw) => write!(
                f,
                "COMPLIANCE_NOTIFY_TIMEOUT_SECS must be a positive integer, got '{}'",
                raw
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
