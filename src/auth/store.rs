use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{AuthError, ConfigError};
use crate::validation::validate_model_uuid;

use super::{AuthorizedKeysSource, ModelSource, UserTag};

/// A model, the users who may reach it and its authorized keys.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ModelAuthorization {
    pub uuid: String,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub authorized_keys: String,
}

/// Fixed authorization data, loaded from TOML or built in code.
///
/// Serves both resolver capabilities when no live control plane is wired up.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StaticAuthorizations {
    #[serde(default)]
    pub models: Vec<ModelAuthorization>,
}

impl StaticAuthorizations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. Models are consulted in insertion order.
    pub fn with_model(
        mut self,
        uuid: impl Into<String>,
        users: &[&str],
        authorized_keys: impl Into<String>,
    ) -> Self {
        self.models.push(ModelAuthorization {
            uuid: uuid.into(),
            users: users.iter().map(|u| u.to_string()).collect(),
            authorized_keys: authorized_keys.into(),
        });
        self
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let store: Self = toml::from_str(content)?;
        for model in &store.models {
            validate_model_uuid(&model.uuid)?;
        }
        Ok(store)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }
}

#[async_trait]
impl ModelSource for StaticAuthorizations {
    async fn model_uuids_for_user(&self, user: &UserTag) -> Result<Vec<String>, AuthError> {
        let id = user.id();
        Ok(self
            .models
            .iter()
            .filter(|model| model.users.iter().any(|u| *u == id))
            .map(|model| model.uuid.clone())
            .collect())
    }
}

#[async_trait]
impl AuthorizedKeysSource for StaticAuthorizations {
    async fn authorized_keys(&self, model_uuid: &str) -> Result<String, AuthError> {
        self.models
            .iter()
            .find(|model| model.uuid == model_uuid)
            .map(|model| model.authorized_keys.clone())
            .ok_or_else(|| AuthError::Remote(format!("model {} not found", model_uuid)))
    }
}
