use std::str::FromStr;

use async_trait::async_trait;
use russh::keys::PublicKey;
use russh::keys::ssh_key::authorized_keys::Entry;

use crate::error::AuthError;

use super::{AuthorizationClient, AuthorizedKeysSource, ModelSource, UserTag};

/// Split an authorized_keys blob into one entry per line.
///
/// Blank lines and `#` comments are dropped; entries are not parsed here.
pub fn split_authorized_keys(keys: &str) -> Vec<&str> {
    keys.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Grants access when the offered key appears in the authorized keys of any
/// model the user can reach.
///
/// The destination model is not consulted: a key authorized on one model
/// opens every model the user has access to. Narrowing this to the
/// destination model needs the destination to travel with the request.
pub struct AuthorizationResolver<M, K> {
    models: M,
    keys: K,
}

impl<M, K> AuthorizationResolver<M, K>
where
    M: ModelSource,
    K: AuthorizedKeysSource,
{
    pub fn new(models: M, keys: K) -> Self {
        Self { models, keys }
    }

    /// Scan models in listing order and keys in stored order; the first
    /// matching key wins.
    pub async fn resolve(&self, user_tag: &str, public_key: &[u8]) -> Result<(), AuthError> {
        let user = UserTag::from_str(user_tag)?;
        let offered = PublicKey::from_bytes(public_key)
            .map_err(|e| AuthError::InvalidPublicKey(e.to_string()))?;

        let model_uuids = self.models.model_uuids_for_user(&user).await.map_err(|e| {
            AuthError::Remote(format!("failed to get model uuids for {}: {}", user, e))
        })?;

        for uuid in &model_uuids {
            let authorized = self.keys.authorized_keys(uuid).await.map_err(|e| {
                AuthError::Remote(format!("failed to get authorized keys for model {}: {}", uuid, e))
            })?;

            for line in split_authorized_keys(&authorized) {
                let Ok(entry) = Entry::from_str(line) else {
                    tracing::debug!(model = %uuid, "skipping unparseable authorized key entry");
                    continue;
                };
                if entry.public_key().key_data() == offered.key_data() {
                    tracing::debug!(user = %user, model = %uuid, "public key matched");
                    return Ok(());
                }
            }
        }

        Err(AuthError::NotFound)
    }
}

#[async_trait]
impl<M, K> AuthorizationClient for AuthorizationResolver<M, K>
where
    M: ModelSource,
    K: AuthorizedKeysSource,
{
    async fn check_public_key(&self, user_tag: &str, public_key: &[u8]) -> Result<(), AuthError> {
        self.resolve(user_tag, public_key).await
    }
}
