//! Workflow configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Upper bound for `min_slot_notice_minutes` (30 days)
pub const MAX_SLOT_NOTICE_MINUTES: i64 = 30 * 24 * 60;

/// Connection and behaviour settings for one target environment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Base URL of the vendor API, e.g. `https://stage-api.example.com`
    pub base_url: String,

    /// Tenant identifier sent as `X-TENANT-ID`
    pub tenant_id: String,

    /// Path prefix shared by every endpoint
    pub api_prefix: String,

    /// Browser portal origin some tenants require in `Origin`/`Referer`
    pub portal_origin: Option<String>,

    /// Login credentials
    pub credentials: Credentials,

    /// Retry behaviour for transient failures
    pub retry: RetryConfig,

    /// Per-request timeout
    pub request_timeout_secs: u64,

    /// Minimum lead time when picking a bookable slot
    pub min_slot_notice_minutes: i64,

    /// Encounter sign-off path, relative to `api_prefix`
    pub sign_off_path: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            base_url: "https://stage-api.ecarehealth.com".to_string(),
            tenant_id: "stage_aithinkitive".to_string(),
            api_prefix: "/api/master".to_string(),
            portal_origin: None,
            credentials: Credentials::default(),
            retry: RetryConfig::default(),
            request_timeout_secs: 30,
            min_slot_notice_minutes: 120,
            sign_off_path: "/encounter-summary/sign-off".to_string(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total invocations allowed per operation, including the first
    pub max_attempts: u32,

    /// Delay schedule between attempts
    pub backoff: BackoffConfig,

    /// Treat HTTP 5xx as transient and retry it
    pub retry_server_errors: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffConfig::Fixed { delay_ms: 2000 },
            retry_server_errors: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    Fixed {
        delay_ms: u64,
    },
    Exponential {
        initial_ms: u64,
        multiplier: f64,
        max_ms: u64,
    },
}

impl WorkflowConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Apply `CAREFLOW_*` environment variable overrides
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("CAREFLOW_BASE_URL") {
            self.base_url = v;
        }
        if let Ok(v) = std::env::var("CAREFLOW_TENANT_ID") {
            self.tenant_id = v;
        }
        if let Ok(v) = std::env::var("CAREFLOW_USERNAME") {
            self.credentials.username = v;
        }
        if let Ok(v) = std::env::var("CAREFLOW_PASSWORD") {
            self.credentials.password = v;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("base_url is empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.tenant_id.trim().is_empty() {
            return Err(Error::Config("tenant_id is empty".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config("request_timeout_secs must be positive".into()));
        }
        if !(0..=MAX_SLOT_NOTICE_MINUTES).contains(&self.min_slot_notice_minutes) {
            return Err(Error::Config(format!(
                "min_slot_notice_minutes must be between 0 and {}: {}",
                MAX_SLOT_NOTICE_MINUTES, self.min_slot_notice_minutes
            )));
        }
        Ok(())
    }

    /// Full URL for a path relative to the API prefix
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix,
            path
        )
    }
}

/// A TOML file holding several named environments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub default_env: String,
    pub environments: BTreeMap<String, WorkflowConfig>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let staging = WorkflowConfig::default();
        let development = WorkflowConfig {
            base_url: "https://dev-api.ecarehealth.com".to_string(),
            tenant_id: "dev_aithinkitive".to_string(),
            ..WorkflowConfig::default()
        };

        let mut environments = BTreeMap::new();
        environments.insert("staging".to_string(), staging);
        environments.insert("development".to_string(), development);

        Self {
            default_env: "staging".to_string(),
            environments,
        }
    }
}

impl ConfigFile {
    /// Load configuration from file, falling back to built-in environments
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: Self = toml::from_str(content)?;
        if !file.environments.contains_key(&file.default_env) {
            return Err(Error::Config(format!(
                "default_env '{}' is not defined",
                file.default_env
            )));
        }
        Ok(file)
    }

    /// Select an environment by name, or the default one
    pub fn environment(&self, name: Option<&str>) -> Result<WorkflowConfig> {
        let name = name.unwrap_or(&self.default_env);
        match self.environments.get(name) {
            Some(config) => Ok(config.clone()),
            None => {
                tracing::warn!("Environment {} not found, using default: {}", name, self.default_env);
                self.environments
                    .get(&self.default_env)
                    .cloned()
                    .ok_or_else(|| Error::Config(format!("unknown environment: {}", name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WorkflowConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.endpoint_url("/login"),
            "https://stage-api.ecarehealth.com/api/master/login"
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WorkflowConfig::default();
        config.base_url = "ftp://example.com".into();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = WorkflowConfig::default();
        config.tenant_id = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bounds_slot_notice() {
        let mut config = WorkflowConfig::default();
        config.min_slot_notice_minutes = -1;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.min_slot_notice_minutes = i64::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.min_slot_notice_minutes = MAX_SLOT_NOTICE_MINUTES;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_file() {
        let toml = r#"
default_env = "qa"

[environments.qa]
base_url = "https://qa.example.com/"
tenant_id = "qa_tenant"
request_timeout_secs = 5

[environments.qa.credentials]
username = "nurse@example.com"
password = "secret"

[environments.qa.retry]
max_attempts = 4
retry_server_errors = false

[environments.qa.retry.backoff]
kind = "exponential"
initial_ms = 100
multiplier = 2.0
max_ms = 1000
"#;
        let file = ConfigFile::from_toml(toml).unwrap();
        let qa = file.environment(None).unwrap();
        assert_eq!(qa.tenant_id, "qa_tenant");
        assert_eq!(qa.api_prefix, "/api/master");
        assert_eq!(qa.retry.max_attempts, 4);
        assert!(!qa.retry.retry_server_errors);
        assert_eq!(
            qa.retry.backoff,
            BackoffConfig::Exponential { initial_ms: 100, multiplier: 2.0, max_ms: 1000 }
        );
        assert_eq!(qa.endpoint_url("/patient"), "https://qa.example.com/api/master/patient");
    }

    #[test]
    fn test_unknown_default_env_is_rejected() {
        let toml = r#"
default_env = "prod"

[environments.qa]
tenant_id = "qa"
"#;
        assert!(ConfigFile::from_toml(toml).is_err());
    }

    #[test]
    fn test_missing_file_uses_builtin_environments() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load(&dir.path().join("careflow.toml")).unwrap();
        let dev = file.environment(Some("development")).unwrap();
        assert_eq!(dev.tenant_id, "dev_aithinkitive");

        // Unknown names fall back to the default environment
        let fallback = file.environment(Some("nope")).unwrap();
        assert_eq!(fallback.tenant_id, "stage_aithinkitive");
    }

    #[test]
    fn test_password_is_redacted() {
        let creds = Credentials {
            username: "a@b.c".into(),
            password: "hunter2".into(),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
    }
}
