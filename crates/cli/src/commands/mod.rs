//! CLI Commands

pub mod fixtures;
pub mod login;
pub mod run;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use careflow_common::{default_config_path, ConfigFile, WorkflowConfig};
use tracing::debug;

/// Where the configuration comes from and what the command line overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub path: Option<PathBuf>,
    pub env: Option<String>,
    pub base_url: Option<String>,
    pub tenant: Option<String>,
}

impl ConfigSource {
    /// File, then `CAREFLOW_*` variables, then flags
    pub fn resolve(&self) -> Result<WorkflowConfig> {
        let path = self.path.clone().unwrap_or_else(default_config_path);
        let file = load_file(&path)?;
        let mut config = file.environment(self.env.as_deref())?.with_env_overrides();

        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(tenant) = &self.tenant {
            config.tenant_id = tenant.clone();
        }

        config.validate()?;
        debug!("Using {} (tenant {})", config.base_url, config.tenant_id);
        Ok(config)
    }
}

fn load_file(path: &Path) -> Result<ConfigFile> {
    ConfigFile::load(path).with_context(|| format!("failed to load config from {}", path.display()))
}
