//! Public key authorization for the terminating hop.
//!
//! The bastion asks a single question of the control plane: may this user
//! sign in with this key? [`AuthorizationClient`] is that capability.
//! [`AuthorizationResolver`] answers it from two smaller capabilities,
//! [`ModelSource`] and [`AuthorizedKeysSource`], so the answer can be
//! computed on either side of the RPC boundary.

pub mod resolver;
pub mod store;
pub mod tag;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthError;

pub use resolver::{AuthorizationResolver, split_authorized_keys};
pub use store::StaticAuthorizations;
pub use tag::UserTag;

/// Decides whether `public_key` (SSH wire encoding) belongs to `user_tag`.
///
/// Must tolerate concurrent calls from many terminating hops.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    async fn check_public_key(&self, user_tag: &str, public_key: &[u8]) -> Result<(), AuthError>;
}

/// Lists the UUIDs of every model a user has any access to.
#[async_trait]
pub trait ModelSource: Send + Sync {
    async fn model_uuids_for_user(&self, user: &UserTag) -> Result<Vec<String>, AuthError>;
}

/// Returns the raw authorized_keys text configured for a model.
#[async_trait]
pub trait AuthorizedKeysSource: Send + Sync {
    async fn authorized_keys(&self, model_uuid: &str) -> Result<String, AuthError>;
}

#[async_trait]
impl<T: AuthorizationClient + ?Sized> AuthorizationClient for Arc<T> {
    async fn check_public_key(&self, user_tag: &str, public_key: &[u8]) -> Result<(), AuthError> {
        (**self).check_public_key(user_tag, public_key).await
    }
}

#[async_trait]
impl<T: ModelSource + ?Sized> ModelSource for Arc<T> {
    async fn model_uuids_for_user(&self, user: &UserTag) -> Result<Vec<String>, AuthError> {
        (**self).model_uuids_for_user(user).await
    }
}

#[async_trait]
impl<T: AuthorizedKeysSource + ?Sized> AuthorizedKeysSource for Arc<T> {
    async fn authorized_keys(&self, model_uuid: &str) -> Result<String, AuthError> {
        (**self).authorized_keys(model_uuid).await
    }
}
