//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::model::CustomerStatus;

/// Workflow configuration.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Folder under which customer photos are uploaded.
    pub users_prefix: String,
    /// Status given to newly registered customers.
    pub initial_status: CustomerStatus,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            users_prefix: "usuarios".to_string(),
            initial_status: CustomerStatus::Registered,
        }
    }
}

impl OnboardingConfig {
    /// Upload path for a customer's photo, keyed by national ID.
    pub fn photo_path(&self, national_id: u64) -> String {
        format!("{}/cliente-{}", self.users_prefix.trim_end_matches('/'), national_id)
    }
}

/// Connection settings for the hosted database/auth/storage service.
#[derive(Debug, Clone)]
pub struct HostedConfig {
    /// Project base URL, e.g. `https://abc.example.co`.
    pub base_url: String,
    pub api_key: SecretString,
    /// Table holding profile rows.
    pub users_table: String,
    /// Storage bucket for photos.
    pub photo_bucket: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl HostedConfig {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            users_table: "users".to_string(),
            photo_bucket: "fotos".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Read the hosted backend settings from the environment.
    ///
    /// `ONBOARD_BACKEND_URL` and `ONBOARD_BACKEND_KEY` are required;
    /// `ONBOARD_USERS_TABLE`, `ONBOARD_PHOTO_BUCKET` and
    /// `ONBOARD_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = required_var("ONBOARD_BACKEND_URL")?;
        let api_key = SecretString::from(required_var("ONBOARD_BACKEND_KEY")?);
        let mut config = Self::new(base_url, api_key);

        if let Ok(table) = std::env::var("ONBOARD_USERS_TABLE") {
            config.users_table = table;
        }
        if let Ok(bucket) = std::env::var("ONBOARD_PHOTO_BUCKET") {
            config.photo_bucket = bucket;
        }
        if let Ok(secs) = std::env::var("ONBOARD_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|e| ConfigError::InvalidValue {
                key: "ONBOARD_TIMEOUT_SECS".to_string(),
                message: format!("{e}"),
            })?;
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn required_var(key: &str) -> Result<String, ConfigError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(key.to_string())),
    }
}
