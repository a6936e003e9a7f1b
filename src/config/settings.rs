use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use tokio::net::TcpListener;

use super::paths::expand_tilde;
use crate::auth::AuthorizationClient;
use crate::error::ConfigError;
use crate::ssh::BastionConfig;
use crate::validation::validate_listen_address;

fn default_listen_address() -> String {
    "0.0.0.0:17022".to_string()
}

/// Bastion settings stored in bastion.toml
#[derive(Debug, Clone, Deserialize)]
pub struct BastionSettings {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    pub host_key_path: PathBuf,
    /// Static authorizations used in place of a live control plane.
    #[serde(default)]
    pub authorizations_path: Option<PathBuf>,
    #[serde(default)]
    pub ssh: SshSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl BastionSettings {
    /// Load from the given file, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = super::paths::settings_file().ok_or(ConfigError::NoConfigDir)?;
                Self::load_from(&path)
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut settings: Self = toml::from_str(content)?;
        settings.validate()?;
        settings.host_key_path = expand_tilde(&settings.host_key_path);
        settings.authorizations_path = settings.authorizations_path.map(|p| expand_tilde(&p));
        settings.logging.log_dir = settings.logging.log_dir.map(|p| expand_tilde(&p));
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_listen_address(&self.listen_address)?;
        if self.host_key_path.as_os_str().is_empty() {
            return Err(ConfigError::NotValid("host_key_path"));
        }
        Ok(())
    }

    /// Read the host key from `host_key_path`.
    pub fn read_host_key(&self) -> Result<SecretString, ConfigError> {
        let key = std::fs::read_to_string(&self.host_key_path).map_err(|e| {
            ConfigError::ReadFile {
                path: self.host_key_path.clone(),
                source: e,
            }
        })?;
        Ok(SecretString::from(key))
    }

    /// Assemble a server config from these settings and the runtime pieces.
    pub fn bastion_config(
        &self,
        host_key: SecretString,
        listener: TcpListener,
        auth_client: Arc<dyn AuthorizationClient>,
    ) -> BastionConfig {
        BastionConfig {
            host_key: Some(host_key),
            listener: Some(listener),
            auth_client: Some(auth_client),
            inactivity_timeout: self.ssh.inactivity_timeout(),
            auth_rejection_time: self.ssh.auth_rejection_time(),
        }
    }
}

fn default_inactivity_timeout() -> u64 {
    3600
}

fn default_auth_rejection_time() -> u64 {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// Seconds before an idle connection is closed. 0 disables the timeout.
    #[serde(default = "default_inactivity_timeout")]
    pub inactivity_timeout_secs: u64,
    #[serde(default = "default_auth_rejection_time")]
    pub auth_rejection_time_ms: u64,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: default_inactivity_timeout(),
            auth_rejection_time_ms: default_auth_rejection_time(),
        }
    }
}

impl SshSettings {
    pub fn inactivity_timeout(&self) -> Option<Duration> {
        (self.inactivity_timeout_secs > 0).then(|| Duration::from_secs(self.inactivity_timeout_secs))
    }

    pub fn auth_rejection_time(&self) -> Duration {
        Duration::from_millis(self.auth_rejection_time_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// Directory for the daily rolling log file. Console only when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}
