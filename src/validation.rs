//! Input validation for settings and for names arriving over the wire.
//!
//! Provides validation functions for listen addresses, user names,
//! application names and model UUIDs so they are checked once, before use.

use std::net::IpAddr;

use regex::Regex;
use std::sync::LazyLock;

/// Validation error with field context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// Pre-compiled regex patterns for validation
static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap());

static USER_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9.+-]*[a-zA-Z0-9])?$").unwrap());

static USER_DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?$").unwrap());

static APPLICATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*$").unwrap());

static MODEL_UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// Validate a hostname (DNS name or IP address).
///
/// # Errors
///
/// Returns `ValidationError` if the hostname is empty, too long, or malformed.
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    let hostname = hostname.trim();

    if hostname.is_empty() {
        return Err(ValidationError::new("hostname", "Hostname is required"));
    }

    // Check total length (DNS max is 253 characters)
    if hostname.len() > 253 {
        return Err(ValidationError::new(
            "hostname",
            "Hostname exceeds maximum length of 253 characters",
        ));
    }

    if hostname.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    for label in hostname.split('.') {
        if !DNS_LABEL_REGEX.is_match(label) {
            return Err(ValidationError::new(
                "hostname",
                format!(
                    "Invalid hostname label '{}': must start and end with alphanumeric, may contain hyphens",
                    label
                ),
            ));
        }
    }

    Ok(())
}

/// Validate a port number string and parse it.
///
/// # Errors
///
/// Returns `ValidationError` if the port is not a valid number in range 1-65535.
pub fn validate_port(port_str: &str) -> Result<u16, ValidationError> {
    let port_str = port_str.trim();

    if port_str.is_empty() {
        return Err(ValidationError::new("port", "Port is required"));
    }

    match port_str.parse::<u16>() {
        Ok(port) if port >= 1 => Ok(port),
        Ok(_) => Err(ValidationError::new(
            "port",
            "Port must be between 1 and 65535",
        )),
        Err(_) => Err(ValidationError::new(
            "port",
            format!("Invalid port number: '{}'", port_str),
        )),
    }
}

/// Validate a `host:port` listen address. IPv6 hosts must be bracketed.
pub fn validate_listen_address(address: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    let (host, port) = address.rsplit_once(':').ok_or_else(|| {
        ValidationError::new(
            "listen_address",
            format!("'{}' is not of the form host:port", address),
        )
    })?;

    let host = match host.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']').ok_or_else(|| {
            ValidationError::new("listen_address", "Unterminated IPv6 bracket")
        })?,
        None => host,
    };

    validate_hostname(host).map_err(|e| ValidationError::new("listen_address", e.message))?;
    validate_port(port).map_err(|e| ValidationError::new("listen_address", e.message))?;
    Ok(())
}

/// Validate the local part of a controller user name.
pub fn validate_user_name(name: &str) -> Result<(), ValidationError> {
    if !USER_NAME_REGEX.is_match(name) {
        return Err(ValidationError::new(
            "user",
            format!("'{}' is not a valid user name", name),
        ));
    }
    Ok(())
}

/// Validate the domain part of an external controller user.
pub fn validate_user_domain(domain: &str) -> Result<(), ValidationError> {
    if !USER_DOMAIN_REGEX.is_match(domain) {
        return Err(ValidationError::new(
            "user",
            format!("'{}' is not a valid user domain", domain),
        ));
    }
    Ok(())
}

/// Validate an application name: lowercase, starts with a letter, and no
/// hyphen-separated segment made only of digits.
pub fn validate_application_name(name: &str) -> Result<(), ValidationError> {
    if !APPLICATION_REGEX.is_match(name) {
        return Err(ValidationError::new(
            "application",
            format!("'{}' is not a valid application name", name),
        ));
    }
    Ok(())
}

/// Validate a model UUID in its canonical lowercase hyphenated form.
pub fn validate_model_uuid(uuid: &str) -> Result<(), ValidationError> {
    if !MODEL_UUID_REGEX.is_match(uuid) {
        return Err(ValidationError::new(
            "model",
            format!("'{}' is not a valid model UUID", uuid),
        ));
    }
    Ok(())
}
