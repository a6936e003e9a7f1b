use std::fmt;

use uuid::Uuid;

use crate::error::DestinationError;
use crate::validation::{validate_application_name, validate_model_uuid};

/// Domain every tunnel destination lives under.
pub const DESTINATION_DOMAIN: &str = "juju.local";

/// The unit a `direct-tcpip` request asks to reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub unit_number: u32,
    pub application_name: String,
    pub model_uuid: Uuid,
    pub port: u16,
}

impl Destination {
    /// Parse `<unit>.<application>.<model-uuid>.juju.local` plus the
    /// requested port.
    pub fn parse(host: &str, port: u32) -> Result<Self, DestinationError> {
        let format_err = || DestinationError::Format(host.to_string());

        let prefix = host
            .strip_suffix(DESTINATION_DOMAIN)
            .and_then(|rest| rest.strip_suffix('.'))
            .ok_or_else(format_err)?;

        let mut parts = prefix.split('.');
        let (Some(unit), Some(application), Some(model), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format_err());
        };

        if unit.is_empty() || !unit.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format_err());
        }
        let unit_number = unit
            .parse::<u32>()
            .map_err(|_| DestinationError::UnitNumber(unit.to_string()))?;

        validate_application_name(application).map_err(|_| format_err())?;
        validate_model_uuid(model).map_err(|_| format_err())?;
        let model_uuid = Uuid::parse_str(model).map_err(|_| format_err())?;

        let port = u16::try_from(port).map_err(|_| DestinationError::Port(port))?;

        Ok(Self {
            unit_number,
            application_name: application.to_string(),
            model_uuid,
            port,
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.unit_number,
            self.application_name,
            self.model_uuid.hyphenated(),
            DESTINATION_DOMAIN
        )
    }
}
