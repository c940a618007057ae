use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::identity::{UserId, UserRecord, UserRole};
use crate::workflows::vault::cipher::{DocumentKey, KeyDecodeError};
use crate::workflows::vault::ScanMode;

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
    pub vault: VaultConfig,
    pub directory: DirectoryConfig,
}

impl AppConfig {
    /// Read `.env` (when present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            environment: AppEnvironment::from_str(&var_or("APP_ENV", "development")),
            server: ServerConfig::from_env()?,
            telemetry: TelemetryConfig::from_env(),
            vault: VaultConfig::from_env()?,
            directory: DirectoryConfig::from_env()?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// HTTP listener binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let port = var_or("APP_PORT", "3000")
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;
        Ok(Self {
            host: var_or("APP_HOST", "127.0.0.1"),
            port,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost { source })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    fn from_env() -> Self {
        Self {
            log_level: var_or("APP_LOG_LEVEL", "info"),
            log_format: LogFormat::from_str(&var_or("APP_LOG_FORMAT", "compact")),
        }
    }
}

/// Output format for the tracing subscriber. Production deployments ship JSON lines to the
/// log pipeline; local runs keep the compact human format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Document vault settings. The key must be supplied externally so documents encrypted by a
/// previous process stay readable after a restart.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub encryption_key: DocumentKey,
    pub scan_mode: ScanMode,
}

impl VaultConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let raw_key = env::var("VAULT_ENCRYPTION_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .ok_or(ConfigError::MissingEncryptionKey)?;
        let encryption_key = DocumentKey::from_encoded(&raw_key)
            .map_err(|source| ConfigError::InvalidEncryptionKey { source })?;

        let scan_mode = match env::var("VAULT_SCAN_MODE") {
            Ok(value) => ScanMode::parse(&value).ok_or(ConfigError::InvalidScanMode { value })?,
            Err(_) => ScanMode::Inline,
        };

        Ok(Self {
            encryption_key,
            scan_mode,
        })
    }
}

/// Accounts recognised by the service, keyed by the identity provider id the auth proxy
/// forwards. `APP_USERS` lists them as comma-separated `external_id:role:email` entries; the
/// external id may not contain `:`.
#[derive(Debug, Clone, Default)]
pub struct DirectoryConfig {
    pub users: Vec<UserRecord>,
}

impl DirectoryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let users = var_or("APP_USERS", "")
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_user_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { users })
    }
}

fn parse_user_entry(entry: &str) -> Result<UserRecord, ConfigError> {
    let invalid = || ConfigError::InvalidUserEntry {
        entry: entry.to_string(),
    };
    let mut parts = entry.splitn(3, ':').map(str::trim);
    let (Some(external_id), Some(role), Some(email)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if external_id.is_empty() || email.is_empty() {
        return Err(invalid());
    }
    let role = match role.to_ascii_lowercase().as_str() {
        "investor" => UserRole::Investor,
        "reviewer" => UserRole::Reviewer,
        "admin" => UserRole::Admin,
        _ => return Err(invalid()),
    };

    Ok(UserRecord {
        id: UserId(format!("user-{external_id}")),
        external_id: external_id.to_string(),
        email: email.to_string(),
        role,
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingEncryptionKey,
    InvalidEncryptionKey { source: KeyDecodeError },
    InvalidScanMode { value: String },
    InvalidUserEntry { entry: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingEncryptionKey => write!(
                f,
                "VAULT_ENCRYPTION_KEY is required; refusing to start with an ephemeral key"
            ),
            ConfigError::InvalidEncryptionKey { source } => {
                write!(f, "VAULT_ENCRYPTION_KEY is invalid: {}", source)
            }
            ConfigError::InvalidScanMode { value } => write!(
                f,
                "VAULT_SCAN_MODE={} is invalid (expected inline|deferred)",
                value
            ),
            ConfigError::InvalidUserEntry { entry } => write!(
                f,
                "APP_USERS entry '{}' is invalid (expected external_id:role:email)",
                entry
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidEncryptionKey { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::MissingEncryptionKey
            | ConfigError::InvalidScanMode { .. }
            | ConfigError::InvalidUserEntry { .. } => None,
        }
    }
}
