use std::fmt;
use std::str::FromStr;

use crate::error::AuthError;
use crate::validation::{validate_user_domain, validate_user_name};

const USER_TAG_PREFIX: &str = "user-";

/// A controller user identity in tag form: `user-<name>[@<domain>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserTag {
    name: String,
    domain: Option<String>,
}

impl UserTag {
    /// Build a tag from an SSH login name such as `alice` or `bob@external`.
    pub fn from_user_id(id: &str) -> Result<Self, AuthError> {
        let (name, domain) = match id.split_once('@') {
            Some((name, domain)) => (name, Some(domain)),
            None => (id, None),
        };

        validate_user_name(name).map_err(|e| AuthError::InvalidUserTag(e.message))?;
        if let Some(domain) = domain {
            validate_user_domain(domain).map_err(|e| AuthError::InvalidUserTag(e.message))?;
        }

        Ok(Self {
            name: name.to_string(),
            domain: domain.map(str::to_string),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// The user id without the tag prefix, e.g. `bob@external`.
    pub fn id(&self) -> String {
        match &self.domain {
            Some(domain) => format!("{}@{}", self.name, domain),
            None => self.name.clone(),
        }
    }
}

impl FromStr for UserTag {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s
            .strip_prefix(USER_TAG_PREFIX)
            .ok_or_else(|| AuthError::InvalidUserTag(format!("'{}' is not a user tag", s)))?;
        Self::from_user_id(id)
    }
}

impl fmt::Display for UserTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", USER_TAG_PREFIX, self.id())
    }
}
