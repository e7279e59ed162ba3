//! Console settings: where the support API lives and who we act as.

use std::time::Duration;
use url::Url;

use crate::error::ClientError;

pub const DEFAULT_BASE_URL: &str = "https://support.amazons.co.ke/api/support";
pub const DEFAULT_AGENT_ID: i64 = 2;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Absolute base URL without a trailing slash.
    pub base_url: String,
    pub token: Option<String>,
    /// Sender id stamped on chat messages written from the console.
    pub agent_id: i64,
    pub timeout: Duration,
}

impl Settings {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        agent_id: i64,
        timeout_secs: u64,
    ) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid base URL '{}': {}", base_url, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if timeout_secs == 0 {
            return Err(ClientError::Config("timeout must be at least one second".to_string()));
        }

        let token = token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());

        Ok(Settings {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            agent_id,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}
