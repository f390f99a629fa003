//! Error types for the wireless link service

use std::time::Duration;

use thiserror::Error;

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for link-layer operations
pub type LinkResult<T> = Result<T, LinkError>;

/// Addressing field identified by a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Ip,
    Gateway,
    Subnet,
    Dns1,
    Dns2,
}

impl std::fmt::Display for AddressField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AddressField::Ip => "ip",
            AddressField::Gateway => "gateway",
            AddressField::Subnet => "subnet",
            AddressField::Dns1 => "dns1",
            AddressField::Dns2 => "dns2",
        };
        f.write_str(name)
    }
}

/// Errors produced by the address/parameter validator
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is not a valid dotted-quad IPv4 address")]
    InvalidField(AddressField),

    #[error("static addressing requires {0} to be set")]
    MissingField(AddressField),

    #[error("channel {0} is outside the valid range 1-13")]
    InvalidChannel(u8),
}

/// Errors surfaced by the underlying radio/protocol stacks
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("scan failed: {0}")]
    ScanFailed(String),

    #[error("driver operation failed: {0}")]
    Operation(String),

    #[error("broker refused connection (state code {code}): {message}")]
    Broker { code: i32, message: String },

    #[error("driver unavailable: {0}")]
    Unavailable(String),
}

impl DriverError {
    /// Numeric state code of the underlying stack, where one exists
    pub fn state_code(&self) -> Option<i32> {
        match self {
            DriverError::Broker { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors reported by the link-establishment layer
#[derive(Error, Debug, Clone)]
pub enum LinkError {
    #[error("invalid addressing: {0}")]
    Validation(#[from] ValidationError),

    #[error("no network or device matching '{0}' was found")]
    NotFound(String),

    #[error("connection was not established within {0:?}")]
    Timeout(Duration),

    #[error("payload serialization failed: {0}")]
    Encode(String),

    #[error("underlying stack error: {0}")]
    Stack(#[from] DriverError),

    #[error("operation requires an established connection")]
    NotConnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = ValidationError::InvalidField(AddressField::Gateway);
        assert!(err.to_string().contains("gateway"));

        let err = ValidationError::MissingField(AddressField::Subnet);
        assert!(err.to_string().contains("subnet"));
    }

    #[test]
    fn test_broker_error_exposes_state_code() {
        let err = DriverError::Broker {
            code: -2,
            message: "connect failed".into(),
        };
        assert_eq!(err.state_code(), Some(-2));
        assert_eq!(DriverError::Operation("x".into()).state_code(), None);
    }
}
