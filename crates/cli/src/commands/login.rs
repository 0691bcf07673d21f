//! Login Command

use anyhow::{bail, Result};
use careflow_common::{Error, WorkflowConfig};
use careflow_workflow::{ApiClient, Retried, RetryPolicy, TokenManager};

use crate::output::print_success;

/// Acquire one token to check credentials and connectivity
pub async fn execute(config: WorkflowConfig) -> Result<()> {
    let client = ApiClient::from_config(&config)?;
    let tokens = TokenManager::new(client, config.credentials.clone());
    let policy = RetryPolicy::from_config(&config.retry);

    match policy.retry_if(|_| tokens.get_token(), Error::is_transient).await {
        Ok(Retried { value, attempts }) => {
            print_success(&format!(
                "Logged in to {} as {} (token {}, {} attempt(s))",
                config.tenant_id,
                config.credentials.username,
                value.preview(),
                attempts
            ));
            Ok(())
        }
        Err(Retried { value, attempts }) => {
            bail!("login failed after {} attempt(s): {}", attempts, value)
        }
    }
}
